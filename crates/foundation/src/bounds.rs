use glam::Vec2;

/// Screen-space axis-aligned box stored as left/top/right/bottom.
///
/// Screen space here is y-up (the projection maps NDC `[-1, 1]` onto
/// `[0, viewport]` without flipping), so `t >= b` for a well-formed box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rect {
    pub l: f32,
    pub t: f32,
    pub r: f32,
    pub b: f32,
}

impl Rect {
    pub fn new(l: f32, t: f32, r: f32, b: f32) -> Self {
        Self { l, t, r, b }
    }

    /// Box of the given size centred on `center`.
    pub fn from_center(center: Vec2, width: f32, height: f32) -> Self {
        let half_w = width * 0.5;
        let half_h = height * 0.5;
        Self {
            l: center.x - half_w,
            t: center.y + half_h,
            r: center.x + half_w,
            b: center.y - half_h,
        }
    }

    pub fn width(&self) -> f32 {
        self.r - self.l
    }

    pub fn height(&self) -> f32 {
        self.t - self.b
    }

    pub fn is_finite(&self) -> bool {
        self.l.is_finite() && self.t.is_finite() && self.r.is_finite() && self.b.is_finite()
    }

    /// Overlap test, inclusive of touching edges.
    pub fn intersects(&self, other: &Rect) -> bool {
        if self.r < other.l || other.r < self.l {
            return false;
        }
        if self.t < other.b || other.t < self.b {
            return false;
        }
        true
    }

    pub fn intersects_circle(&self, circle: &Circle) -> bool {
        let closest_x = circle.center.x.clamp(self.l.min(self.r), self.r.max(self.l));
        let closest_y = circle.center.y.clamp(self.b.min(self.t), self.t.max(self.b));
        let dx = closest_x - circle.center.x;
        let dy = closest_y - circle.center.y;
        (dx * dx + dy * dy).sqrt() <= circle.radius
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f32,
}

impl Circle {
    pub fn new(center: Vec2, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn intersects(&self, other: &Circle) -> bool {
        self.center.distance(other.center) <= self.radius + other.radius
    }

    pub fn bounding_box(&self) -> Rect {
        Rect {
            l: self.center.x - self.radius,
            t: self.center.y + self.radius,
            r: self.center.x + self.radius,
            b: self.center.y - self.radius,
        }
    }
}

/// Collision shape used by the screen-space indices.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Shape {
    Rect(Rect),
    Circle(Circle),
}

impl Shape {
    pub fn bounding_box(&self) -> Rect {
        match self {
            Shape::Rect(rect) => *rect,
            Shape::Circle(circle) => circle.bounding_box(),
        }
    }

    pub fn intersects(&self, other: &Shape) -> bool {
        match (self, other) {
            (Shape::Rect(a), Shape::Rect(b)) => a.intersects(b),
            (Shape::Circle(a), Shape::Circle(b)) => a.intersects(b),
            (Shape::Rect(rect), Shape::Circle(circle))
            | (Shape::Circle(circle), Shape::Rect(rect)) => rect.intersects_circle(circle),
        }
    }
}

impl From<Rect> for Shape {
    fn from(rect: Rect) -> Self {
        Shape::Rect(rect)
    }
}

impl From<Circle> for Shape {
    fn from(circle: Circle) -> Self {
        Shape::Circle(circle)
    }
}
