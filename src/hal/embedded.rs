//! Adapters from `embedded-hal` 1.0 pins and PWM channels to the kernel traits.
//!
//! Requires the `embedded-hal` feature. Board crates build these from their
//! HAL's pin types and hand them to the kernel; interrupts, timers and the
//! SPI data register stay in the board crate because `embedded-hal` has no
//! interrupt-driven byte API.
//!
//! | Adapter | Trait |
//! |---------|-------|
//! | [`PinBridge`] | [`HBridge`] |
//! | [`Led`] | [`Indicator`] |
//! | [`SelectLines`] | [`ChipSelect`] |

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;

use crate::traits::{BridgeDrive, ChipSelect, HBridge, Indicator};

// ============================================================================
// H-bridge
// ============================================================================

/// Error from a [`PinBridge`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeError<P, G> {
    /// The PWM channel rejected the duty.
    Pwm(P),
    /// A direction pin could not be driven.
    Pin(G),
}

/// One H-bridge channel driven by a PWM output and two direction pins.
pub struct PinBridge<PWM, IN1, IN2> {
    pwm: PWM,
    in1: IN1,
    in2: IN2,
}

impl<PWM, IN1, IN2> PinBridge<PWM, IN1, IN2>
where
    PWM: SetDutyCycle,
    IN1: OutputPin,
    IN2: OutputPin<Error = IN1::Error>,
{
    /// Wraps the outputs. The bridge is left as the pins were.
    pub fn new(pwm: PWM, in1: IN1, in2: IN2) -> Self {
        Self { pwm, in1, in2 }
    }

    /// Releases the outputs.
    pub fn free(self) -> (PWM, IN1, IN2) {
        (self.pwm, self.in1, self.in2)
    }
}

impl<PWM, IN1, IN2> HBridge for PinBridge<PWM, IN1, IN2>
where
    PWM: SetDutyCycle,
    IN1: OutputPin,
    IN2: OutputPin<Error = IN1::Error>,
{
    type Error = BridgeError<PWM::Error, IN1::Error>;

    fn set_duty(&mut self, duty: u8) -> Result<(), Self::Error> {
        self.pwm
            .set_duty_cycle_fraction(u16::from(duty), u16::from(u8::MAX))
            .map_err(BridgeError::Pwm)
    }

    fn drive(&mut self, drive: BridgeDrive) -> Result<(), Self::Error> {
        let (in1, in2) = drive.legs();
        self.in1.set_state(in1.into()).map_err(BridgeError::Pin)?;
        self.in2.set_state(in2.into()).map_err(BridgeError::Pin)
    }
}

// ============================================================================
// LED
// ============================================================================

/// Whether the LED is driven active-high or active-low on the board wiring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActiveLevel {
    /// Pin high lights the LED.
    High,
    /// Pin low lights the LED.
    Low,
}

/// LED on a GPIO that remembers its polarity and last state.
pub struct Led<PIN> {
    pin: PIN,
    active: ActiveLevel,
    on: bool,
}

impl<PIN: OutputPin> Led<PIN> {
    /// Create an LED wrapper, initializing it to off.
    pub fn new(pin: PIN, active: ActiveLevel) -> Self {
        let mut led = Self {
            pin,
            active,
            on: true,
        };
        led.set(false);
        led
    }

    /// Releases the pin.
    pub fn free(self) -> PIN {
        self.pin
    }
}

impl<PIN: OutputPin> Indicator for Led<PIN> {
    fn set(&mut self, on: bool) {
        let high = match self.active {
            ActiveLevel::High => on,
            ActiveLevel::Low => !on,
        };
        self.pin.set_state(high.into()).ok();
        self.on = on;
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

// ============================================================================
// Chip select
// ============================================================================

/// Active-low select lines, one per bus port.
pub struct SelectLines<PIN, const N: usize> {
    lines: [PIN; N],
}

impl<PIN: OutputPin, const N: usize> SelectLines<PIN, N> {
    /// Wraps the lines and deasserts them all.
    pub fn new(lines: [PIN; N]) -> Self {
        let mut cs = Self { lines };
        cs.deselect_all();
        cs
    }

    /// Releases the pins.
    pub fn free(self) -> [PIN; N] {
        self.lines
    }
}

impl<PIN: OutputPin, const N: usize> ChipSelect for SelectLines<PIN, N> {
    fn select(&mut self, target: u8) {
        self.deselect_all();
        if let Some(line) = self.lines.get_mut(usize::from(target)) {
            line.set_low().ok();
        }
    }

    fn deselect_all(&mut self) {
        for line in self.lines.iter_mut() {
            line.set_high().ok();
        }
    }
}
