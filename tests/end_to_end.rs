//! Motherboard driver and dual H-bridge board talking over the loopback bus

use lace_kernel::board::DualMotorBoard;
use lace_kernel::config::{KernelConfig, SchedulerConfig};
use lace_kernel::event::{Event, EventQueue};
use lace_kernel::hal::{LoopbackBus, MockBridge, MockChipSelect, MockIndicator};
use lace_kernel::traits::{BridgeDrive, Indicator};
use lace_kernel::transport::{
    DhbLink, LinkError, OperatingMode, SpiMaster, LINK_MODE_SET, LINK_MOTOR_GET, LINK_MOTOR_SET,
    LINK_VERSION,
};
use lace_kernel::Direction;

type Board = DualMotorBoard<MockBridge, MockIndicator>;

const PORT: u8 = 2;

struct System {
    master: SpiMaster<32>,
    bus: LoopbackBus<Board>,
    cs: MockChipSelect,
    queue: EventQueue<8>,
    dhb: DhbLink,
}

impl System {
    fn new(config: &KernelConfig) -> Self {
        let board = DualMotorBoard::new(
            [MockBridge::new(), MockBridge::new()],
            MockIndicator::new(),
            MockIndicator::new(),
            config,
        );
        Self {
            master: SpiMaster::new(),
            bus: LoopbackBus::new(board),
            cs: MockChipSelect::new(),
            queue: EventQueue::new(),
            dhb: DhbLink::new(PORT),
        }
    }

    /// Pump the master, then hand the completion to the link.
    fn finish(&mut self) -> Event {
        while !self.master.is_idle() {
            self.master
                .on_transfer_complete(&mut self.bus, &mut self.cs, &mut self.queue);
        }
        assert_eq!(self.queue.poll(), Some(Event::Spi { port: PORT }));
        let _ = self.dhb.complete(&mut self.master, &mut self.queue);
        self.queue.poll().expect("link completion event")
    }

    fn board(&mut self) -> &mut Board {
        self.bus.handler_mut()
    }

    /// One board main-loop pass.
    fn run_board(&mut self) {
        let board = self.board();
        let flags = board.take_flags();
        board.run_tasks(flags).unwrap();
    }
}

// ============================================================================
// Command Flow Tests
// ============================================================================

#[test]
fn motor_set_drives_both_channels() {
    let mut sys = System::new(&KernelConfig::default());
    sys.dhb
        .set_targets([300, -150], &mut sys.master, &mut sys.bus, &mut sys.cs)
        .unwrap();
    assert_eq!(
        sys.finish(),
        Event::Custom {
            id: LINK_MOTOR_SET,
            data: 1
        }
    );

    sys.run_board();
    let board = sys.bus.handler();
    assert_eq!(board.motor(0).target(), 300);
    assert_eq!(board.motor(0).direction(), Direction::Forward);
    assert_eq!(board.motor(1).magnitude(), 150);
    assert_eq!(board.motor(1).direction(), Direction::Reverse);
    assert_eq!(board.bridge(0).drive, BridgeDrive::Forward);
    assert_eq!(board.bridge(1).drive, BridgeDrive::Reverse);
    assert_eq!(board.bridge(0).duty, 255);
    assert_eq!(board.bridge(1).duty, 150);
}

#[test]
fn motor_get_returns_measured_feedback() {
    let mut sys = System::new(&KernelConfig::default());
    sys.dhb
        .set_targets([300, -150], &mut sys.master, &mut sys.bus, &mut sys.cs)
        .unwrap();
    sys.finish();

    // Motor 0 turns with a 100-tick half-cycle, motor 1 never moves.
    let mut level = false;
    for _ in 0..3 {
        for _ in 0..100 {
            sys.board().on_tick();
        }
        level = !level;
        sys.board().on_pin_change([level, false]);
    }
    sys.run_board();

    sys.dhb
        .request_feedback(&mut sys.master, &mut sys.bus, &mut sys.cs)
        .unwrap();
    assert_eq!(
        sys.finish(),
        Event::Custom {
            id: LINK_MOTOR_GET,
            data: 1
        }
    );
    assert_eq!(sys.dhb.feedback(), [50, 0]);
}

#[test]
fn probe_reports_configured_version() {
    let config = KernelConfig::default().with_transport(
        lace_kernel::config::TransportConfig::default().with_version(0x07),
    );
    let mut sys = System::new(&config);
    sys.dhb
        .probe(&mut sys.master, &mut sys.bus, &mut sys.cs)
        .unwrap();
    assert_eq!(
        sys.finish(),
        Event::Custom {
            id: LINK_VERSION,
            data: 1
        }
    );
    assert_eq!(sys.dhb.version(), Some(0x07));
}

#[test]
fn mode_set_changes_heartbeat_cadence() {
    let config = KernelConfig::default().with_scheduler(
        SchedulerConfig::default()
            .with_heartbeat_divider(1)
            .with_heartbeat_rates(50, 10),
    );
    let mut sys = System::new(&config);
    assert!(sys.board().status_indicator().is_on());

    let beats = |sys: &mut System, n: u32| {
        for _ in 0..n {
            sys.board().on_tick();
            sys.run_board();
        }
    };

    // PWM cadence: no toggle within 10 runs.
    beats(&mut sys, 10);
    assert!(sys.board().status_indicator().is_on());

    sys.dhb
        .set_mode(OperatingMode::Velocity, &mut sys.master, &mut sys.bus, &mut sys.cs)
        .unwrap();
    assert_eq!(
        sys.finish(),
        Event::Custom {
            id: LINK_MODE_SET,
            data: 1
        }
    );
    assert_eq!(sys.board().mode(), OperatingMode::Velocity);

    beats(&mut sys, 9);
    assert!(sys.board().status_indicator().is_on());
    beats(&mut sys, 1);
    assert!(!sys.board().status_indicator().is_on());
}

// ============================================================================
// Failure Tests
// ============================================================================

#[test]
fn corrupted_motor_set_leaves_board_untouched() {
    let mut sys = System::new(&KernelConfig::default());
    sys.bus.corrupt_at(5, 0x40);
    sys.dhb
        .set_targets([300, -150], &mut sys.master, &mut sys.bus, &mut sys.cs)
        .unwrap();
    assert_eq!(
        sys.finish(),
        Event::Custom {
            id: LINK_MOTOR_SET,
            data: 0
        }
    );

    sys.run_board();
    let board = sys.bus.handler();
    assert_eq!(board.motor(0).target(), 0);
    assert_eq!(board.motor(1).target(), 0);
    assert!(board.fault_indicator().is_on());
    assert_eq!(sys.dhb.failures(), 1);

    // The next good command clears the fault.
    sys.dhb
        .set_targets([10, 10], &mut sys.master, &mut sys.bus, &mut sys.cs)
        .unwrap();
    sys.finish();
    assert!(!sys.bus.handler().fault_indicator().is_on());
}

#[test]
fn request_while_pending_is_refused() {
    let mut sys = System::new(&KernelConfig::default());
    sys.dhb
        .request_feedback(&mut sys.master, &mut sys.bus, &mut sys.cs)
        .unwrap();
    assert_eq!(
        sys.dhb
            .request_current(&mut sys.master, &mut sys.bus, &mut sys.cs),
        Err(LinkError::Busy)
    );
    assert_eq!(
        sys.dhb.complete(&mut sys.master, &mut sys.queue),
        Err(LinkError::Busy)
    );
    assert!(sys.dhb.is_pending());
}
