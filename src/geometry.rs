// src/geometry.rs
//
// 虚拟屏幕坐标：所有显示器拼起来的整体坐标系，主屏左边/上边的显示器坐标为负数。

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Point { x: self.x + dx, y: self.y + dy }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// 矩形选区结构体（宽高不可能为负）
pub struct Rect { pub x: i32, pub y: i32, pub w: u32, pub h: u32 }

impl Rect {
    pub const fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Rect { x, y, w, h }
    }

    /// 两点构成的轴对齐包围盒，与两点的先后顺序无关
    pub fn from_points(a: Point, b: Point) -> Self {
        Rect {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            w: a.x.abs_diff(b.x),
            h: a.y.abs_diff(b.y),
        }
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add_unsigned(self.w)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add_unsigned(self.h)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.y >= self.y && p.x < self.right() && p.y < self.bottom()
    }

    #[cfg(test)]
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        (x0 < x1 && y0 < y1).then(|| Rect::from_points(Point::new(x0, y0), Point::new(x1, y1)))
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        Rect::from_points(Point::new(x0, y0), Point::new(x1, y1))
    }

    /// 换算到以 `origin` 为原点的窗口本地坐标
    pub fn to_local(&self, origin: Point) -> Rect {
        Rect { x: self.x - origin.x, y: self.y - origin.y, ..*self }
    }
}

/// 所有显示器边界的并集；没有显示器时返回 None
pub fn virtual_screen<'a>(monitors: impl IntoIterator<Item = &'a Rect>) -> Option<Rect> {
    monitors.into_iter().copied().reduce(|acc, m| acc.union(&m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_is_order_independent() {
        let a = Rect::from_points(Point::new(100, 100), Point::new(300, 250));
        let b = Rect::from_points(Point::new(300, 250), Point::new(100, 100));
        assert_eq!(a, Rect::new(100, 100, 200, 150));
        assert_eq!(a, b);
    }

    #[test]
    fn from_points_handles_negative_coordinates() {
        let r = Rect::from_points(Point::new(-50, 20), Point::new(-1920, -10));
        assert_eq!(r, Rect::new(-1920, -10, 1870, 30));
        assert_eq!(r.right(), -50);
        assert_eq!(r.bottom(), 20);
    }

    #[test]
    fn virtual_screen_spans_left_and_above_monitors() {
        let monitors = [
            Rect::new(0, 0, 1920, 1080),
            Rect::new(-1280, -200, 1280, 1024),
            Rect::new(1920, 0, 1920, 1200),
        ];
        let vs = virtual_screen(&monitors).unwrap();
        assert_eq!(vs, Rect::new(-1280, -200, 5120, 1400));
        assert!(virtual_screen(&[] as &[Rect]).is_none());
    }

    #[test]
    fn intersect_and_containment() {
        let screen = Rect::new(-100, -100, 200, 200);
        let r = Rect::new(50, 50, 100, 100);
        assert_eq!(screen.intersect(&r), Some(Rect::new(50, 50, 50, 50)));
        assert_eq!(screen.intersect(&Rect::new(100, 0, 10, 10)), None);
        assert!(screen.contains_rect(&Rect::new(-100, -100, 200, 200)));
        assert!(!screen.contains_rect(&r));
        assert!(screen.contains(Point::new(-100, 99)));
        assert!(!screen.contains(Point::new(100, 0)));
    }

    #[test]
    fn to_local_subtracts_window_origin() {
        let sel = Rect::new(-1000, 40, 300, 200);
        let local = sel.to_local(Point::new(-1280, -200));
        assert_eq!(local, Rect::new(280, 240, 300, 200));
    }
}
