//! Interactive region calibration
//!
//! Two-point flow: the operator hovers the cursor over each corner of the
//! game region and confirms with ENTER, with a short countdown so the hand
//! can leave the keyboard before the position is sampled.

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use crate::geometry::Region;
use crate::input::{InputError, InputSynthesizer};

/// Calibration errors
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("console I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Input(#[from] InputError),
}

/// Run the two-point calibration flow on the console and return the
/// normalized region. Corners may be given in any order.
pub fn calibrate_region(input: &mut dyn InputSynthesizer) -> Result<Region, CalibrationError> {
    let stdin = io::stdin();
    let mut lines = stdin.lock();
    calibrate_with(input, &mut lines, 3)
}

/// Calibration core with injectable console input and countdown length.
pub fn calibrate_with<R: BufRead>(
    input: &mut dyn InputSynthesizer,
    lines: &mut R,
    countdown_secs: u32,
) -> Result<Region, CalibrationError> {
    let a = sample_corner(input, lines, "TOP-LEFT", countdown_secs)?;
    let b = sample_corner(input, lines, "BOTTOM-RIGHT", countdown_secs)?;
    let region = Region::from_corners(a, b);
    println!(
        "Region defined: ({}, {}) {}x{}",
        region.x, region.y, region.width, region.height
    );
    Ok(region)
}

fn sample_corner<R: BufRead>(
    input: &mut dyn InputSynthesizer,
    lines: &mut R,
    label: &str,
    countdown_secs: u32,
) -> Result<(i32, i32), CalibrationError> {
    println!("Press ENTER, then move the mouse to the {label} corner ({countdown_secs}s countdown)...");
    io::stdout().flush()?;
    let mut confirm = String::new();
    lines.read_line(&mut confirm)?;

    for i in (1..=countdown_secs).rev() {
        println!("  {i}...");
        thread::sleep(Duration::from_secs(1));
    }

    let p = input.cursor_position()?;
    println!("Got {label}: ({}, {})", p.x, p.y);
    Ok((p.x, p.y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::geometry::ScreenPoint;
    use crate::input::KeySpec;

    /// Input synthesizer that replays scripted cursor positions.
    struct ScriptedCursor {
        positions: Vec<ScreenPoint>,
        next: usize,
    }

    impl InputSynthesizer for ScriptedCursor {
        fn click(&mut self, _p: ScreenPoint) -> Result<(), InputError> {
            Ok(())
        }

        fn move_to(&mut self, _p: ScreenPoint) -> Result<(), InputError> {
            Ok(())
        }

        fn scroll_down(&mut self, _lines: i32) -> Result<(), InputError> {
            Ok(())
        }

        fn press(&mut self, _key: &KeySpec) -> Result<(), InputError> {
            Ok(())
        }

        fn cursor_position(&mut self) -> Result<ScreenPoint, InputError> {
            let p = self.positions[self.next];
            self.next += 1;
            Ok(p)
        }
    }

    #[test]
    fn test_two_point_calibration_normalizes_corners() {
        // Corners given bottom-right first; the region must still come out
        // with a top-left origin.
        let mut input = ScriptedCursor {
            positions: vec![ScreenPoint::new(916, 621), ScreenPoint::new(271, 87)],
            next: 0,
        };
        let mut console = Cursor::new("\n\n");

        let region = calibrate_with(&mut input, &mut console, 0).unwrap();
        assert_eq!(region, Region::new(271, 87, 645, 534));
    }
}
