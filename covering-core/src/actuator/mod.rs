mod pwm;

pub use pwm::*;

/// A single physical output driven by one axis, such as a PWM channel.
pub trait ActuatorOutput: Send {
    fn set_level(&mut self, level: u8);

    fn min_level(&self) -> u8;

    fn max_level(&self) -> u8;
}

impl<A: ActuatorOutput + ?Sized> ActuatorOutput for Box<A> {
    fn set_level(&mut self, level: u8) {
        (**self).set_level(level)
    }

    fn min_level(&self) -> u8 {
        (**self).min_level()
    }

    fn max_level(&self) -> u8 {
        (**self).max_level()
    }
}
