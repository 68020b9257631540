//! Orthographic cameras and the rotated copies used for mirrored rendering.

use std::f32::consts::TAU;

use glam::{Mat4, Vec2, Vec3};

/// Size of the gameplay field in world units.
pub const PLAYFIELD_SIZE: Vec2 = Vec2::new(512.0, 384.0);
/// Share of the viewport height the playfield occupies at scale 1.
const PLAYFIELD_HEIGHT_SHARE: f32 = 0.8;

/// 2D orthographic camera. The viewport center is the screen-space origin, so
/// rotations applied after the view transform pivot around it.
#[derive(Debug, Clone)]
pub struct Camera {
    viewport: Vec2,
    y_down: bool,
    origin: Vec2,
    position: Vec2,
    scale: Vec2,
    rotation: f32,
    projection: Mat4,
    view: Mat4,
    projection_view: Mat4,
}

impl Camera {
    pub fn new() -> Self {
        let mut camera = Self {
            viewport: Vec2::new(2.0, 2.0),
            y_down: false,
            origin: Vec2::ZERO,
            position: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection_view: Mat4::IDENTITY,
        };
        camera.update();
        camera
    }

    pub fn set_viewport(&mut self, width: f32, height: f32, y_down: bool) {
        self.viewport = Vec2::new(width.max(1.0), height.max(1.0));
        self.y_down = y_down;
    }

    /// Fits the 512x384 playfield into the viewport, centered and y-down.
    pub fn set_playfield_viewport(&mut self, width: f32, height: f32, scale: f32) {
        self.set_viewport(width, height, true);
        self.origin = PLAYFIELD_SIZE / 2.0;
        let fit = height.max(1.0) * PLAYFIELD_HEIGHT_SHARE / PLAYFIELD_SIZE.y;
        self.scale = Vec2::splat(fit * scale);
    }

    /// World point that maps onto the viewport center.
    pub fn set_origin(&mut self, origin: Vec2) {
        self.origin = origin;
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn set_scale(&mut self, scale: Vec2) {
        self.scale = scale;
    }

    pub fn set_rotation(&mut self, rotation: f32) {
        self.rotation = rotation;
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    /// Rebuilds the cached matrices after setter calls.
    pub fn update(&mut self) {
        let half = self.viewport / 2.0;
        let (bottom, top) = if self.y_down {
            (half.y, -half.y)
        } else {
            (-half.y, half.y)
        };

        self.projection = Mat4::orthographic_rh(-half.x, half.x, bottom, top, -1.0, 1.0);
        self.view = Mat4::from_translation(self.position.extend(0.0))
            * Mat4::from_rotation_z(self.rotation)
            * Mat4::from_scale(self.scale.extend(1.0))
            * Mat4::from_translation((-self.origin).extend(0.0));
        self.projection_view = self.projection * self.view;
    }

    pub fn projection_view(&self) -> Mat4 {
        self.projection_view
    }

    /// World point to screen space relative to the viewport center.
    pub fn project(&self, world: Vec2) -> Vec2 {
        self.view.transform_point3(world.extend(0.0)).truncate()
    }

    /// World point to normalised device coordinates.
    pub fn project_ndc(&self, world: Vec2) -> Vec2 {
        self.projection_view
            .project_point3(world.extend(0.0))
            .truncate()
    }

    /// Generates `count` copies of this camera, the i-th rotated by
    /// `i * step` radians about the viewport center.
    pub fn gen_rotated(&self, count: usize, step: f32) -> MirrorCameraSet {
        let transforms = (0..count)
            .map(|i| {
                let rotation = i as f32 * step;
                CameraTransform {
                    rotation,
                    projection_view: self.projection
                        * Mat4::from_rotation_z(rotation)
                        * self.view,
                }
            })
            .collect();

        MirrorCameraSet { transforms }
    }

    /// Mirror set with the rotation step evenly splitting a full turn.
    pub fn gen_divided(&self, divides: usize) -> MirrorCameraSet {
        let divides = divides.max(1);
        self.gen_rotated(divides, -TAU / divides as f32)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

/// One rotated copy of a base camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTransform {
    /// Rotation relative to the base camera, in radians.
    pub rotation: f32,
    pub projection_view: Mat4,
}

impl CameraTransform {
    pub fn project_ndc(&self, world: Vec2) -> Vec2 {
        self.projection_view
            .project_point3(Vec3::new(world.x, world.y, 0.0))
            .truncate()
    }
}

/// Rotated camera copies for kaleidoscope rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MirrorCameraSet {
    transforms: Vec<CameraTransform>,
}

impl MirrorCameraSet {
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CameraTransform> {
        self.transforms.get(index)
    }

    /// The unrotated base transform, used for layers drawn once.
    pub fn primary(&self) -> Option<&CameraTransform> {
        self.transforms.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CameraTransform> {
        self.transforms.iter()
    }

    pub fn rotations(&self) -> Vec<f32> {
        self.transforms.iter().map(|t| t.rotation).collect()
    }
}
