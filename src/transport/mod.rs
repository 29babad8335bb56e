//! Synchronous serial transport: CRC, framing, and both ends of the bus.
//!
//! - [`crc`] - Dallas/iButton CRC-8
//! - [`protocol`] - command table, request [`Frame`]s and reply verification
//! - [`master`] - interrupt-driven [`SpiMaster`]
//! - [`slave`] - byte-at-a-time [`SlaveProtocol`]
//! - [`link`] - [`DhbLink`], the motherboard's driver for one module

pub mod crc;
pub mod link;
pub mod master;
pub mod protocol;
pub mod slave;

pub use link::{
    link_event_id, DhbLink, LINK_CURRENT_GET, LINK_MODE_SET, LINK_MOTOR_GET, LINK_MOTOR_SET,
    LINK_VERSION,
};
pub use master::{SpiMaster, TransportError, SPI_BUFFER_LEN};
pub use protocol::{Command, Frame, LinkError, OperatingMode, Reply, START_MARKER};
pub use slave::{SlaveFault, SlaveProtocol, SlaveState};
