use foundation::bounds::{Rect, Shape};
use glam::Vec2;
use rustc_hash::{FxHashMap, FxHashSet};

/// Screen box of a label centred on its projected anchor.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CollisionAgent {
    pub location: Vec2,
    pub width: f32,
    pub height: f32,
}

impl CollisionAgent {
    pub fn new(location: Vec2, width: f32, height: f32) -> Self {
        Self {
            location,
            width,
            height,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_center(self.location, self.width, self.height)
    }
}

/// Fixed `count x count` grid of `cluster_size` cells holding one box per cell.
///
/// Coordinates outside the grid clamp to the border cells.
#[derive(Debug, Clone)]
pub struct BucketGrid {
    cluster_size: f32,
    count: usize,
    cells: Vec<Option<Rect>>,
}

impl BucketGrid {
    pub fn new(cluster_size: f32, count: usize) -> Self {
        let count = count.max(1);
        Self {
            cluster_size: cluster_size.max(f32::EPSILON),
            count,
            cells: vec![None; count * count],
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(None);
    }

    fn cell(&self, v: f32) -> usize {
        let i = (v / self.cluster_size).floor() as i64;
        i.clamp(0, self.count as i64 - 1) as usize
    }

    fn span(&self, rect: &Rect) -> (usize, usize, usize, usize) {
        (
            self.cell(rect.l),
            self.cell(rect.r),
            self.cell(rect.b),
            self.cell(rect.t),
        )
    }

    /// Places `agent` unless it overlaps a box in any cell it spans.
    pub fn add_agent(&mut self, agent: CollisionAgent) -> bool {
        let rect = agent.bounds();
        if !rect.is_finite() {
            return false;
        }
        let (x0, x1, y0, y1) = self.span(&rect);

        for x in x0..=x1 {
            for y in y0..=y1 {
                if let Some(occupant) = &self.cells[x * self.count + y]
                    && occupant.intersects(&rect)
                {
                    return false;
                }
            }
        }
        for x in x0..=x1 {
            for y in y0..=y1 {
                self.cells[x * self.count + y] = Some(rect);
            }
        }
        true
    }
}

type Cell = (i32, i32);

/// Hashed grid with list buckets. Shapes are stored once and referenced from
/// every cell their bounding box touches.
#[derive(Debug, Clone)]
pub struct SpaceIntersections {
    cell_size: f32,
    shapes: Vec<Shape>,
    grid: FxHashMap<Cell, Vec<u32>>,
}

impl SpaceIntersections {
    /// Screen coordinates are clamped into this range before bucketing.
    const COORD_LIMIT: f32 = 10_000.0;

    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(f32::EPSILON),
            shapes: Vec::new(),
            grid: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
        self.grid.clear();
    }

    fn cell(&self, v: f32) -> i32 {
        (v.clamp(-Self::COORD_LIMIT, Self::COORD_LIMIT) / self.cell_size).floor() as i32
    }

    fn cells(&self, shape: &Shape) -> impl Iterator<Item = Cell> + use<> {
        let b = shape.bounding_box();
        let (x0, x1) = (self.cell(b.l), self.cell(b.r));
        let (y0, y1) = (self.cell(b.b), self.cell(b.t));
        (x0..=x1).flat_map(move |x| (y0..=y1).map(move |y| (x, y)))
    }

    fn collides(&self, group: &[Shape]) -> bool {
        let mut seen: FxHashSet<u32> = FxHashSet::default();
        for shape in group {
            for cell in self.cells(shape) {
                let Some(bucket) = self.grid.get(&cell) else {
                    continue;
                };
                for &idx in bucket {
                    if !seen.insert(idx) {
                        continue;
                    }
                    if group
                        .iter()
                        .any(|s| s.intersects(&self.shapes[idx as usize]))
                    {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Commits `shape` without testing it.
    pub fn insert(&mut self, shape: Shape) {
        let idx = self.shapes.len() as u32;
        let cells: Vec<Cell> = self.cells(&shape).collect();
        self.shapes.push(shape);
        for cell in cells {
            self.grid.entry(cell).or_default().push(idx);
        }
    }

    pub fn add(&mut self, shape: Shape) -> bool {
        self.add_as_single(&[shape])
    }

    /// Places every shape of `group` or none of them.
    pub fn add_as_single(&mut self, group: &[Shape]) -> bool {
        if group.iter().any(|s| !s.bounding_box().is_finite()) {
            return false;
        }
        if self.collides(group) {
            return false;
        }
        for shape in group {
            self.insert(*shape);
        }
        true
    }
}
