//! Indexed polyface meshes.
//!
//! Point indices are 1-based and signed: a negative index marks the edge
//! leaving that vertex as hidden. Faces are either terminated by a `0`
//! index or, when `num_per_face > 1`, stored in fixed-size blocks padded
//! with zeros.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use vcad_snap_math::{Point2, Point3, Range3, Transform, Vec3};

use crate::curve::Segment3;
use crate::plane::{newell_normal, point_in_polygon, Plane};

/// An indexed polyface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Polyface {
    /// Vertex coordinates.
    pub points: Vec<Point3>,
    /// Signed 1-based vertex indices.
    pub point_index: Vec<i32>,
    /// Fixed face size, or 0/1 for zero-terminated faces.
    #[serde(default)]
    pub num_per_face: u32,
    /// Vertex normals.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub normals: Vec<Vec3>,
    /// 1-based normal indices parallel to `point_index`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub normal_index: Vec<i32>,
}

/// One face read from the index array.
#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    /// Position of the face's first index.
    pub read_index: usize,
    /// Number of index reads consumed, terminator included.
    pub reads: usize,
    /// 0-based vertex indices.
    pub vertices: Vec<usize>,
    /// Whether the edge from vertex `i` to vertex `i + 1` is visible.
    pub visible: Vec<bool>,
    /// 0-based normal indices, when the mesh has normals.
    pub normals: Vec<usize>,
}

impl Facet {
    /// Edge `i` as a vertex pair.
    pub fn edge(&self, i: usize) -> (usize, usize) {
        (self.vertices[i], self.vertices[(i + 1) % self.vertices.len()])
    }
}

/// Nearest point on a facet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FacetLocation {
    /// Index of the facet in read order.
    pub facet: usize,
    /// The point.
    pub point: Point3,
    /// Distance from the query point.
    pub distance: f64,
}

/// Reads faces from a polyface's index array.
pub struct Facets<'a> {
    mesh: &'a Polyface,
    cursor: usize,
}

impl Iterator for Facets<'_> {
    type Item = Facet;

    fn next(&mut self) -> Option<Facet> {
        let indices = &self.mesh.point_index;
        let block = self.mesh.num_per_face as usize;
        while self.cursor < indices.len() {
            let start = self.cursor;
            let end = if block > 1 {
                (start + block).min(indices.len())
            } else {
                indices[start..]
                    .iter()
                    .position(|&i| i == 0)
                    .map_or(indices.len(), |p| start + p)
            };
            let stop = if block > 1 { end } else { (end + 1).min(indices.len()) };
            self.cursor = stop;

            let mut facet = Facet {
                read_index: start,
                reads: stop - start,
                vertices: Vec::new(),
                visible: Vec::new(),
                normals: Vec::new(),
            };
            for k in start..end {
                let raw = indices[k];
                if raw == 0 {
                    break;
                }
                let vertex = raw.unsigned_abs() as usize - 1;
                if vertex >= self.mesh.points.len() {
                    continue;
                }
                facet.vertices.push(vertex);
                facet.visible.push(raw > 0);
                if let Some(&n) = self.mesh.normal_index.get(k) {
                    if n != 0 && (n.unsigned_abs() as usize) <= self.mesh.normals.len() {
                        facet.normals.push(n.unsigned_abs() as usize - 1);
                    }
                }
            }
            if facet.vertices.len() >= 3 {
                return Some(facet);
            }
        }
        None
    }
}

/// Union-find over facet indices.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

impl Polyface {
    /// Faces in read order.
    pub fn facets(&self) -> Facets<'_> {
        Facets {
            mesh: self,
            cursor: 0,
        }
    }

    fn facet_points(&self, facet: &Facet) -> Vec<Point3> {
        facet.vertices.iter().map(|&v| self.points[v]).collect()
    }

    /// Nearest point on `facet` to `p`.
    pub fn facet_closest_point(&self, facet: &Facet, p: &Point3) -> Option<Point3> {
        let pts = self.facet_points(facet);
        let boundary = pts
            .iter()
            .enumerate()
            .map(|(i, a)| Segment3::new(*a, pts[(i + 1) % pts.len()]).closest_point_bounded(p))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))?;
        let normal = newell_normal(&pts);
        if normal.norm() < 1e-30 {
            return Some(boundary.point);
        }
        let plane = Plane::from_normal(pts[0], normal);
        let foot = plane.project_point(p);
        let uv: Vec<Point2> = pts.iter().map(|q| plane.project(q)).collect();
        if point_in_polygon(&plane.project(&foot), &uv) {
            Some(foot)
        } else {
            Some(boundary.point)
        }
    }

    /// Unit normal of `facet`: averaged vertex normals when present, else the
    /// polygon normal.
    pub fn facet_normal(&self, facet: &Facet) -> Option<Vec3> {
        if !facet.normals.is_empty() {
            let sum = facet
                .normals
                .iter()
                .fold(Vec3::zeros(), |acc, &n| acc + self.normals[n]);
            if let Some(n) = sum.try_normalize(1e-30) {
                return Some(n);
            }
        }
        newell_normal(&self.facet_points(facet)).try_normalize(1e-30)
    }

    /// Nearest facet point over the whole mesh.
    pub fn closest_facet(&self, p: &Point3) -> Option<FacetLocation> {
        let mut best: Option<FacetLocation> = None;
        for (index, facet) in self.facets().enumerate() {
            let Some(point) = self.facet_closest_point(&facet, p) else {
                continue;
            };
            let distance = (point - p).norm();
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(FacetLocation {
                    facet: index,
                    point,
                    distance,
                });
            }
        }
        best
    }

    /// Facets joined to `seed` through hidden edges, in read order.
    pub fn connected_across_hidden_edges(&self, seed: usize) -> Vec<Facet> {
        let facets: Vec<Facet> = self.facets().collect();
        if seed >= facets.len() {
            return Vec::new();
        }
        let mut sets = DisjointSet::new(facets.len());
        let mut hidden_owner: HashMap<(usize, usize), usize> = HashMap::new();
        for (fi, facet) in facets.iter().enumerate() {
            for (ei, &visible) in facet.visible.iter().enumerate() {
                if visible {
                    continue;
                }
                let (a, b) = facet.edge(ei);
                match hidden_owner.get(&edge_key(a, b)) {
                    Some(&other) => sets.union(other, fi),
                    None => {
                        hidden_owner.insert(edge_key(a, b), fi);
                    }
                }
            }
        }
        let root = sets.find(seed);
        facets
            .into_iter()
            .enumerate()
            .filter(|(i, _)| sets.find(*i) == root)
            .map(|(_, f)| f)
            .collect()
    }

    /// Visible edges of a group of facets, each shared edge once.
    pub fn visible_edges(&self, facets: &[Facet]) -> Vec<Segment3> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for facet in facets {
            for (ei, &visible) in facet.visible.iter().enumerate() {
                let (a, b) = facet.edge(ei);
                if visible && seen.insert(edge_key(a, b)) {
                    out.push(Segment3::new(self.points[a], self.points[b]));
                }
            }
        }
        out
    }

    /// Copy with points and normals mapped by `t`.
    pub fn transformed(&self, t: &Transform) -> Self {
        Self {
            points: self.points.iter().map(|p| t.apply_point(p)).collect(),
            normals: self
                .normals
                .iter()
                .map(|n| t.apply_normal(n))
                .collect(),
            ..self.clone()
        }
    }

    /// Range of the vertices.
    pub fn range(&self) -> Range3 {
        Range3::from_points(self.points.iter())
    }
}
