//! Flat-ground stand-in for navigation and collision data.

use smart_objects::{Box3, Capsule, NavigationValidator, Vec3};

/// Infinite walkable plane at a fixed height with box obstacles.
///
/// Points inside an obstacle footprint are not navigable; capsules touching
/// an obstacle overlap.
#[derive(Debug, Clone, Default)]
pub struct FlatGroundNavigation {
    ground_height: f64,
    obstacles: Vec<Box3>,
}

impl FlatGroundNavigation {
    pub fn new(ground_height: f64, obstacles: Vec<Box3>) -> Self {
        Self { ground_height, obstacles }
    }

    fn ground_point(&self, point: Vec3) -> Vec3 {
        Vec3::new(point.x, point.y, self.ground_height)
    }

    fn inside_obstacle(&self, point: Vec3) -> bool {
        self.obstacles.iter().any(|obstacle| obstacle.contains_point(point))
    }
}

impl NavigationValidator for FlatGroundNavigation {
    fn has_navigation_data(&self) -> bool {
        true
    }

    fn project_to_navigable(&self, point: Vec3, search_box: &Box3) -> Option<Vec3> {
        let ground = self.ground_point(point);
        (search_box.contains_point(ground) && !self.inside_obstacle(ground)).then_some(ground)
    }

    fn trace_ground(&self, point: Vec3, search_box: &Box3) -> Option<Vec3> {
        let ground = self.ground_point(point);
        search_box.contains_point(ground).then_some(ground)
    }

    fn test_overlap(&self, colliders: &[Capsule]) -> bool {
        colliders.iter().any(|capsule| {
            let bounds = capsule.bounds();
            self.obstacles.iter().any(|obstacle| obstacle.intersects(&bounds))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pillar() -> FlatGroundNavigation {
        FlatGroundNavigation::new(
            10.0,
            vec![Box3::from_center_extent(Vec3::new(100.0, 0.0, 50.0), Vec3::new(20.0, 20.0, 50.0))],
        )
    }

    #[test]
    fn projects_onto_the_ground_plane() {
        let nav = pillar();
        let point = Vec3::new(-50.0, 30.0, 25.0);
        let search = Box3::from_center_extent(point, Vec3::new(5.0, 5.0, 40.0));
        assert_eq!(nav.project_to_navigable(point, &search), Some(Vec3::new(-50.0, 30.0, 10.0)));

        let too_high = Vec3::new(-50.0, 30.0, 200.0);
        let search = Box3::from_center_extent(too_high, Vec3::new(5.0, 5.0, 40.0));
        assert_eq!(nav.project_to_navigable(too_high, &search), None);
    }

    #[test]
    fn obstacles_block_projection_and_overlap() {
        let nav = pillar();
        let point = Vec3::new(100.0, 0.0, 10.0);
        let search = Box3::from_center_extent(point, Vec3::splat(50.0));
        assert_eq!(nav.project_to_navigable(point, &search), None);
        assert!(nav.trace_ground(point, &search).is_some());

        let touching = Capsule { center: Vec3::new(130.0, 0.0, 60.0), radius: 15.0, half_height: 40.0 };
        let clear = Capsule { center: Vec3::new(300.0, 0.0, 60.0), radius: 15.0, half_height: 40.0 };
        assert!(nav.test_overlap(&[clear, touching]));
        assert!(!nav.test_overlap(&[clear]));
        assert!(!nav.test_overlap(&[]));
    }
}
