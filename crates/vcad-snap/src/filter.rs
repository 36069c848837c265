//! Which stream entries a snap may consider.

use vcad_snap_math::{Point3, Range3};

use crate::geometry::{GeometryClass, GeometryParams, SubCategoryId};
use crate::request::ViewFlags;
use crate::stream::EntryId;

/// Entry filter applied while walking a geometry stream.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EntryFilter {
    /// Only the entry that produced the pick. Overrides everything else.
    pub target: Option<EntryId>,
    /// Only entries on this sub-category.
    pub sub_category: Option<SubCategoryId>,
    /// Only entries of this class. A `Pattern` filter admits every class.
    pub geometry_class: Option<GeometryClass>,
    /// Hide classes the view does not display.
    pub view_flags: Option<ViewFlags>,
}

impl EntryFilter {
    /// Whether the entry `id` drawn with `params` is skipped.
    ///
    /// A target is compared at object level for object entries (the part
    /// placement entry matches any target inside that part) and exactly
    /// for entries read from a part.
    pub fn skips(&self, id: &EntryId, params: &GeometryParams) -> bool {
        if let Some(target) = &self.target {
            let wanted = if id.in_part() {
                *target
            } else {
                target.element_level()
            };
            return wanted != *id;
        }
        if let Some(sub_category) = self.sub_category {
            if params.sub_category != Some(sub_category) {
                return true;
            }
        }
        if let Some(class) = self.geometry_class {
            if class != GeometryClass::Pattern && params.geometry_class != class {
                return true;
            }
        }
        if let Some(flags) = &self.view_flags {
            if !flags.shows(params.geometry_class) {
                return true;
            }
        }
        false
    }

    /// Whether the entry placing a part is skipped. Only the target applies;
    /// attribute filters are checked on the part's own entries.
    pub fn skips_part(&self, id: &EntryId) -> bool {
        self.target
            .is_some_and(|target| target.element_level() != id.element_level())
    }

    /// Whether a target entry is named, which makes the walk precise.
    pub fn is_prefiltered(&self) -> bool {
        self.target.is_some()
    }
}

/// Whether `local_point` lies more than `max_outside` outside `range`.
pub fn outside_range(range: &Range3, local_point: &Point3, max_outside: f64) -> bool {
    range.distance_outside(local_point) > max_outside
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ElementId;

    fn params(class: GeometryClass, sub_category: Option<u64>) -> GeometryParams {
        GeometryParams {
            sub_category: sub_category.map(SubCategoryId),
            geometry_class: class,
            ..GeometryParams::default()
        }
    }

    #[test]
    fn test_target_overrides_other_filters() {
        let filter = EntryFilter {
            target: Some(EntryId::element(2)),
            sub_category: Some(SubCategoryId(99)),
            ..EntryFilter::default()
        };
        let p = params(GeometryClass::Primary, Some(1));
        assert!(!filter.skips(&EntryId::element(2), &p));
        assert!(filter.skips(&EntryId::element(1), &p));
        assert!(filter.is_prefiltered());
    }

    #[test]
    fn test_target_inside_part() {
        let target = EntryId {
            index: 1,
            part_id: Some(ElementId(40)),
            part_index: 3,
        };
        let filter = EntryFilter {
            target: Some(target),
            ..EntryFilter::default()
        };
        let p = GeometryParams::default();
        // The placement entry matches at object level.
        assert!(!filter.skips(&target.element_level(), &p));
        assert!(!filter.skips(&target, &p));
        let sibling = EntryId {
            part_index: 2,
            ..target
        };
        assert!(filter.skips(&sibling, &p));
        assert!(!filter.skips_part(&target.element_level()));
        assert!(filter.skips_part(&EntryId {
            index: 2,
            ..target.element_level()
        }));
        assert!(!EntryFilter::default().skips_part(&target));
    }

    #[test]
    fn test_sub_category_and_class() {
        let filter = EntryFilter {
            sub_category: Some(SubCategoryId(7)),
            geometry_class: Some(GeometryClass::Construction),
            ..EntryFilter::default()
        };
        let id = EntryId::element(0);
        assert!(filter.skips(&id, &params(GeometryClass::Construction, Some(8))));
        assert!(filter.skips(&id, &params(GeometryClass::Primary, Some(7))));
        assert!(!filter.skips(&id, &params(GeometryClass::Construction, Some(7))));

        let pattern = EntryFilter {
            geometry_class: Some(GeometryClass::Pattern),
            ..EntryFilter::default()
        };
        assert!(!pattern.skips(&id, &params(GeometryClass::Primary, None)));
    }

    #[test]
    fn test_view_flags_hide_classes() {
        let filter = EntryFilter {
            view_flags: Some(ViewFlags {
                constructions: false,
                ..ViewFlags::default()
            }),
            ..EntryFilter::default()
        };
        let id = EntryId::element(0);
        assert!(filter.skips(&id, &params(GeometryClass::Construction, None)));
        assert!(!filter.skips(&id, &params(GeometryClass::Dimension, None)));
    }

    #[test]
    fn test_outside_range() {
        let range = Range3::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        assert!(!outside_range(&range, &Point3::new(1.5, 0.5, 0.5), 1.0));
        assert!(outside_range(&range, &Point3::new(3.0, 0.5, 0.5), 1.0));
    }
}
