//! Presentation seam.
//!
//! Rendering is platform specific. The [`Presenter`] trait is everything the
//! runtime needs from a user interface; input flows the other way as
//! [`crate::UserInput`].

use quickdraw_core::Environment;
use rand::Rng;

use crate::notice::Notice;

/// Where and how the tap target appears.
///
/// All values are fractions: `rotation` of a full turn, `x` and `y` of the
/// free screen area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Rotation in turns, in `[0, 1)`.
    pub rotation: f64,
    /// Horizontal offset, in `[0, 1)`.
    pub x: f64,
    /// Vertical offset, in `[0, 1)`.
    pub y: f64,
}

impl Placement {
    /// Random placement for a freshly armed round.
    pub fn random(env: &impl Environment) -> Self {
        let mut rng = env.rng();
        Self {
            rotation: rng.gen_range(0.0..1.0),
            x: rng.gen_range(0.0..1.0),
            y: rng.gen_range(0.0..1.0),
        }
    }
}

/// Platform-specific user interface.
pub trait Presenter: Send {
    /// Replace the status line.
    fn status(&mut self, text: &str);

    /// Show the roster, host first.
    fn roster(&mut self, players: &[String]);

    /// Show the tap target.
    fn show_target(&mut self, placement: Placement);

    /// Hide the tap target.
    fn hide_target(&mut self);

    /// Put a modal notice on screen.
    fn show_notice(&mut self, notice: &Notice);

    /// Remove the modal notice from screen.
    fn clear_notice(&mut self);
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[derive(Clone)]
    struct FixedEnv(u8);

    impl Environment for FixedEnv {
        fn now(&self) -> Instant {
            Instant::now()
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(self.0);
        }
    }

    #[test]
    fn placement_fractions_stay_in_unit_range() {
        for byte in [0x00, 0x7f, 0xff] {
            let placement = Placement::random(&FixedEnv(byte));
            for value in [placement.rotation, placement.x, placement.y] {
                assert!((0.0..1.0).contains(&value), "{byte:#x} gave {value}");
            }
        }
    }

    #[test]
    fn placement_follows_the_environment() {
        assert_ne!(Placement::random(&FixedEnv(0x00)), Placement::random(&FixedEnv(0xff)));
    }
}
