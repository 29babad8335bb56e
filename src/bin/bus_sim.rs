//! Host simulation of a motherboard driving one dual H-bridge board.
//!
//! Runs the kernel on both sides of a loopback bus with a crude motor model
//! closing the loop through the encoders. The motherboard behaviour mirrors
//! the bring-up test sequence:
//!
//! 1. 250 ms after start, switch the module to velocity mode
//! 2. 250 ms later, set targets of 30 and 50
//! 3. every 100 ms, alternately read feedback and current
//!
//! # Run
//!
//! ```bash
//! cargo run --features sim --bin bus_sim -- 3000
//! RUST_LOG=debug cargo run --features sim --bin bus_sim
//! ```

use anyhow::anyhow;
use lace_kernel::board::DualMotorBoard;
use lace_kernel::config::{KernelConfig, TimerConfig};
use lace_kernel::event::{Event, EventQueue, EVENT_QUEUE_CAPACITY};
use lace_kernel::hal::{LoopbackBus, MockBridge, MockChipSelect, MockIndicator, MockTick};
use lace_kernel::sync::Shared;
use lace_kernel::timer::{TimerScheduler, MAX_TIMERS};
use lace_kernel::traits::{Indicator, TickSource};
use lace_kernel::transport::{
    DhbLink, OperatingMode, SpiMaster, LINK_CURRENT_GET, LINK_MOTOR_GET, SPI_BUFFER_LEN,
};

type Board = DualMotorBoard<MockBridge, MockIndicator>;

/// Bus port the module is plugged into.
const DHB_PORT: u8 = 1;

/// Default simulated run time in milliseconds.
const DEFAULT_RUN_MS: u32 = 3_000;

/// Plant phase units per encoder half-cycle.
const PLANT_HALF_CYCLE: u32 = 4_096;

const TIMER_START: usize = 0;
const TIMER_POLL: usize = 1;
const TIMER_TARGET: usize = 2;

static QUEUE: Shared<EventQueue<EVENT_QUEUE_CAPACITY>> = Shared::new(EventQueue::new());

/// Wheel whose speed follows the bridge duty.
#[derive(Default)]
struct Wheel {
    phase: u32,
    level: bool,
}

impl Wheel {
    /// Advance one board tick under `bridge` and return the encoder level.
    fn step(&mut self, bridge: &MockBridge) -> bool {
        self.phase += u32::from(bridge.duty);
        if self.phase >= PLANT_HALF_CYCLE {
            self.phase -= PLANT_HALF_CYCLE;
            self.level = !self.level;
        }
        self.level
    }
}

/// Motherboard application state.
struct Motherboard {
    timers: TimerScheduler<MAX_TIMERS>,
    master: SpiMaster<SPI_BUFFER_LEN>,
    cs: MockChipSelect,
    dhb: DhbLink,
    poll_feedback: bool,
    status: MockIndicator,
    timer_cfg: TimerConfig,
}

impl Motherboard {
    fn handle(&mut self, event: Event, bus: &mut LoopbackBus<Board>) -> anyhow::Result<()> {
        let ms = |t: u32| self.timer_cfg.ticks_for_ms(t);
        match event {
            Event::Timer { slot } => match usize::from(slot) {
                TIMER_START => {
                    self.dhb
                        .set_mode(OperatingMode::Velocity, &mut self.master, bus, &mut self.cs)?;
                    self.timers.start(TIMER_TARGET, ms(250), None)?;
                }
                TIMER_TARGET => {
                    self.dhb
                        .set_targets([30, 50], &mut self.master, bus, &mut self.cs)?;
                    self.timers.start(TIMER_POLL, ms(100), None)?;
                }
                TIMER_POLL => {
                    if self.poll_feedback {
                        self.dhb.request_feedback(&mut self.master, bus, &mut self.cs)?;
                    } else {
                        self.dhb.request_current(&mut self.master, bus, &mut self.cs)?;
                    }
                    self.poll_feedback = !self.poll_feedback;
                    self.status.toggle();
                }
                _ => {}
            },
            Event::Spi { port } if port == DHB_PORT => {
                // Failures are reported through the Custom event as well.
                let _ = QUEUE.lock(|q| self.dhb.complete(&mut self.master, q));
            }
            Event::Custom { id, data } => {
                if id == LINK_MOTOR_GET {
                    let [a, b] = self.dhb.feedback();
                    println!("fbk {} {} (ok={})", a, b, data);
                    self.timers.start(TIMER_POLL, ms(100), None)?;
                } else if id == LINK_CURRENT_GET {
                    let [a, b] = self.dhb.current();
                    println!("cur {} {} (ok={})", a, b, data);
                    self.timers.start(TIMER_POLL, ms(100), None)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Service transfer-complete interrupts until the bus is idle.
    fn pump(&mut self, bus: &mut LoopbackBus<Board>) {
        while !self.master.is_idle() {
            QUEUE.lock(|q| self.master.on_transfer_complete(bus, &mut self.cs, q));
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let run_ms = match std::env::args().nth(1) {
        Some(arg) => arg.parse::<u32>()?,
        None => DEFAULT_RUN_MS,
    };

    println!();
    println!("================================");
    println!("  lace-kernel bus simulation");
    println!("================================");
    println!();

    let config = KernelConfig::default();

    // =========================================================================
    // Peripheral board
    // =========================================================================
    let mut board = DualMotorBoard::new(
        [MockBridge::new(), MockBridge::new()],
        MockIndicator::new(),
        MockIndicator::new(),
        &config,
    );
    let mut board_tick = MockTick::new();
    board
        .start(&mut board_tick)
        .map_err(|e| anyhow!("board start failed: {}", e))?;
    println!("[OK] DHB board ticking at {} Hz", config.scheduler.tick_hz);

    let mut bus = LoopbackBus::new(board);

    // =========================================================================
    // Motherboard
    // =========================================================================
    let mut mb = Motherboard {
        timers: TimerScheduler::new(),
        master: SpiMaster::new(),
        cs: MockChipSelect::new(),
        dhb: DhbLink::new(DHB_PORT),
        poll_feedback: true,
        status: MockIndicator::new(),
        timer_cfg: config.timer.clone(),
    };
    let mut mb_tick = MockTick::new();
    mb.timers
        .init(&mut mb_tick, config.timer.tick_hz)
        .map_err(|_| anyhow!("timer tick failed to start"))?;
    mb.timers
        .start(TIMER_START, config.timer.ticks_for_ms(250), None)?;
    println!("[OK] Motherboard timers at {} Hz", config.timer.tick_hz);
    println!();

    let board_ticks_per_ms = config.scheduler.tick_hz / config.timer.tick_hz;
    let mut wheels = [Wheel::default(), Wheel::default()];

    // =========================================================================
    // Main loop, one iteration per simulated millisecond
    // =========================================================================
    for now in 0..run_ms {
        QUEUE.lock(|q| mb.timers.tick(q));

        let board = bus.handler_mut();
        for _ in 0..board_ticks_per_ms {
            let levels = [wheels[0].step(board.bridge(0)), wheels[1].step(board.bridge(1))];
            board.on_tick();
            board.on_pin_change(levels);
        }
        let flags = board.take_flags();
        let flags = board
            .run_tasks(flags)
            .map_err(|_| anyhow!("bridge write failed"))?;
        if flags.heartbeat {
            // Current sense roughly follows duty.
            for motor in 0..2 {
                let duty = board.bridge(motor).duty;
                board.record_current(motor, u16::from(duty) * 4);
            }
        }

        while let Some(event) = QUEUE.lock(|q| q.poll()) {
            log::debug!("t={}ms {:?}", now, event);
            if let Err(e) = mb.handle(event, &mut bus) {
                log::warn!("t={}ms {}", now, e);
            }
        }
        mb.pump(&mut bus);
    }

    let board = bus.handler();
    println!();
    println!(
        "Done after {} ms: mode {:?}, duty [{}, {}], feedback {:?}, link failures {}",
        run_ms,
        board.mode(),
        board.bridge(0).duty,
        board.bridge(1).duty,
        [board.motor(0).last_feedback(), board.motor(1).last_feedback()],
        mb.dhb.failures(),
    );
    if board.fault_indicator().is_on() {
        println!("!! slave fault indicator lit !!");
    }

    bus.handler_mut()
        .stop(&mut board_tick)
        .map_err(|e| anyhow!("board stop failed: {}", e))?;
    mb_tick
        .stop()
        .map_err(|_| anyhow!("timer tick failed to stop"))?;

    Ok(())
}
