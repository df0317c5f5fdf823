/// Reserved prefix marking a payload as a device control command rather
/// than chat content.
pub const COMMAND_PREFIX: &str = "MODE:";

/// True iff the payload is a control command. Pure predicate, applied
/// identically on the inbound and outbound paths: commands still travel
/// the bus but never enter the chat history.
pub fn is_control_command(payload: &str) -> bool {
    payload.starts_with(COMMAND_PREFIX)
}
