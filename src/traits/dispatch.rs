//! Command dispatch seam between the bus slave and the board it runs on.

use crate::transport::protocol::OperatingMode;

/// Board-side effects of a validated slave command.
///
/// [`SlaveProtocol`](crate::transport::SlaveProtocol) calls the setters only
/// after a command's checksum has been accepted, and the getters when a read
/// command is recognised so that one transfer returns one consistent
/// snapshot. Everything runs inside the bus interrupt, so implementations
/// must be short and must not block.
pub trait CommandHandler {
    /// Version byte returned by `VERSION`.
    fn version(&self) -> u8;

    /// Apply `MODE_SET`.
    fn set_mode(&mut self, mode: OperatingMode);

    /// Apply `MOTOR_SET`.
    fn set_targets(&mut self, targets: [i16; 2]);

    /// Measured feedback for `MOTOR_GET`.
    fn feedback(&self) -> [i16; 2];

    /// Latest current samples for `CURRENT_GET`.
    fn current(&self) -> [u16; 2];

    /// Drive the fault indicator.
    ///
    /// Called with `true` when a framing fault is detected and with `false`
    /// when the next valid command clears it. Default does nothing.
    fn indicate_fault(&mut self, faulted: bool) {
        let _ = faulted;
    }
}
