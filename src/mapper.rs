//! Square-to-pixel coordinate math.
//! Assumes a1 is the bottom-left cell of the detected rectangle; the board is
//! an 8x8 grid of equal integer-truncated cells and the target point is the
//! cell center.

use shakmaty::Square;

use crate::vision::BoardRect;

/// A point in screen pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Pixel center of `square` within `rect`.
/// File grows rightward from the rectangle's left edge, rank grows upward
/// from its bottom edge.
pub fn square_center(rect: BoardRect, square: Square) -> Point {
    let step_x = (rect.right - rect.left) / 8;
    let step_y = (rect.bottom - rect.top) / 8;

    Point {
        x: rect.left + step_x / 2 + square.file() as i32 * step_x,
        y: rect.bottom - step_y / 2 - square.rank() as i32 * step_y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_800() -> BoardRect {
        BoardRect {
            left: 0,
            top: 0,
            right: 800,
            bottom: 800,
        }
    }

    #[test]
    fn test_a1_center_on_800_board() {
        let p = square_center(rect_800(), Square::A1);
        assert_eq!(p, Point { x: 50, y: 750 });
    }

    #[test]
    fn test_h8_center_on_800_board() {
        let p = square_center(rect_800(), Square::H8);
        assert_eq!(p, Point { x: 750, y: 50 });
    }

    #[test]
    fn test_a1_left_of_and_below_h8() {
        let a1 = square_center(rect_800(), Square::A1);
        let h8 = square_center(rect_800(), Square::H8);
        assert!(a1.x < h8.x);
        assert!(a1.y > h8.y);
    }

    #[test]
    fn test_offset_rectangle() {
        let rect = BoardRect {
            left: 100,
            top: 200,
            right: 500,
            bottom: 600,
        };
        // 400px board, 50px cells, 25px inset.
        let e4 = square_center(rect, Square::E4);
        assert_eq!(e4, Point { x: 100 + 25 + 4 * 50, y: 600 - 25 - 3 * 50 });
    }

    #[test]
    fn test_truncated_cell_size() {
        // 801px wide: cells truncate to 100, same as the 800px case.
        let rect = BoardRect {
            left: 0,
            top: 0,
            right: 801,
            bottom: 801,
        };
        assert_eq!(square_center(rect, Square::A1), Point { x: 50, y: 751 });
    }
}
