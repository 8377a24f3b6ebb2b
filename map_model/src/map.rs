use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};

use geom::{Duration, FindClosest, GPSBounds, LonLat, Pt2D};

use crate::{DirectedRoad, Intersection, IntersectionID, LocationOnRoad, Road, RoadNetwork};

/// The input format for a map: intersections in GPS coordinates, and one-way roads between them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawMap {
    pub intersections: Vec<RawIntersection>,
    pub roads: Vec<Road>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawIntersection {
    pub id: IntersectionID,
    pub gps: LonLat,
}

pub struct Map {
    intersections: BTreeMap<IntersectionID, Intersection>,
    roads: BTreeMap<DirectedRoad, Road>,
    // Edges are weighted by the road's travel time
    graph: DiGraphMap<IntersectionID, Duration>,
    gps_bounds: GPSBounds,
    closest_road: FindClosest<DirectedRoad>,
}

impl Map {
    /// Builds a map from intersections that already have planar coordinates. If none of them have
    /// GPS coordinates, `project` treats longitude as x and latitude as y.
    pub fn new(intersections: Vec<Intersection>, roads: Vec<Road>) -> Result<Map> {
        let mut map = Map {
            intersections: BTreeMap::new(),
            roads: BTreeMap::new(),
            graph: DiGraphMap::new(),
            gps_bounds: GPSBounds::new(),
            closest_road: FindClosest::new(),
        };

        for i in intersections {
            if let Some(gps) = i.gps {
                map.gps_bounds.update(gps);
            }
            map.graph.add_node(i.id);
            if let Some(old) = map.intersections.insert(i.id, i) {
                bail!("{} is defined twice", old.id);
            }
        }

        for road in roads {
            let id = road.id();
            let pt1 = map.endpoint(id.src_i, id)?;
            let pt2 = map.endpoint(id.dst_i, id)?;
            if id.src_i == id.dst_i {
                bail!("{} is a loop", id);
            }
            if road.travel_time < Duration::ZERO {
                bail!("{} has negative travel time {}", id, road.travel_time);
            }
            if map.roads.contains_key(&id) {
                bail!("{} is defined twice", id);
            }

            map.graph.add_edge(id.src_i, id.dst_i, road.travel_time);
            map.closest_road.add_segment(id, pt1, pt2);
            map.roads.insert(id, road);
        }

        info!(
            "Map has {} intersections and {} roads",
            abstutil::prettyprint_usize(map.intersections.len()),
            abstutil::prettyprint_usize(map.roads.len())
        );
        Ok(map)
    }

    /// Projects every intersection relative to the southwest corner of all of them.
    pub fn from_raw(raw: RawMap) -> Result<Map> {
        let bounds = GPSBounds::from(
            &raw.intersections
                .iter()
                .map(|i| i.gps)
                .collect::<Vec<_>>(),
        );
        let intersections = raw
            .intersections
            .into_iter()
            .map(|i| Intersection {
                id: i.id,
                point: bounds.convert(i.gps),
                gps: Some(i.gps),
            })
            .collect();
        Map::new(intersections, raw.roads)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Map> {
        let path = path.as_ref();
        let raw: RawMap = abstutil::read_json(path)?;
        Map::from_raw(raw).with_context(|| format!("building map from {}", path.display()))
    }

    pub fn get_road(&self, id: DirectedRoad) -> Option<&Road> {
        self.roads.get(&id)
    }

    pub fn gps_bounds(&self) -> &GPSBounds {
        &self.gps_bounds
    }

    fn endpoint(&self, i: IntersectionID, road: DirectedRoad) -> Result<Pt2D> {
        match self.intersections.get(&i) {
            Some(i) => Ok(i.point),
            None => bail!("{} points to unknown {}", road, i),
        }
    }

    fn pathfind(
        &self,
        from: IntersectionID,
        to: IntersectionID,
    ) -> Option<(Duration, Vec<IntersectionID>)> {
        if !self.graph.contains_node(from) || !self.graph.contains_node(to) {
            return None;
        }
        petgraph::algo::astar(
            &self.graph,
            from,
            |i| i == to,
            |(_, _, cost)| *cost,
            |_| Duration::ZERO,
        )
    }
}

impl RoadNetwork for Map {
    fn intersection(&self, id: IntersectionID) -> Option<&Intersection> {
        self.intersections.get(&id)
    }

    fn all_intersection_ids(&self) -> Vec<IntersectionID> {
        self.intersections.keys().cloned().collect()
    }

    fn neighbors(&self, id: IntersectionID) -> Vec<(IntersectionID, Duration)> {
        if !self.graph.contains_node(id) {
            return Vec::new();
        }
        self.graph
            .edges(id)
            .map(|(_, dst, cost)| (dst, *cost))
            .collect()
    }

    fn shortest_path(
        &self,
        from: IntersectionID,
        to: IntersectionID,
    ) -> Option<Vec<IntersectionID>> {
        self.pathfind(from, to).map(|(_, path)| path)
    }

    fn travel_time(&self, from: IntersectionID, to: IntersectionID) -> Option<Duration> {
        self.pathfind(from, to).map(|(cost, _)| cost)
    }

    fn travel_time_between_locations(
        &self,
        from: &LocationOnRoad,
        to: &LocationOnRoad,
    ) -> Option<Duration> {
        if from.road == to.road && to.travel_time_from_start >= from.travel_time_from_start {
            return Some(to.travel_time_from_start - from.travel_time_from_start);
        }
        let road = self.roads.get(&from.road)?;
        let rest_of_road = (road.travel_time - from.travel_time_from_start).max(Duration::ZERO);
        let between = self.travel_time(from.road.dst_i, to.road.src_i)?;
        Some(rest_of_road + between + to.travel_time_from_start)
    }

    fn nearest_road(&self, gps: LonLat) -> Option<DirectedRoad> {
        self.closest_road
            .closest(self.project(gps))
            .map(|(road, _)| road)
    }

    fn project(&self, gps: LonLat) -> Pt2D {
        if self.gps_bounds.is_empty() {
            Pt2D::new(gps.x(), gps.y())
        } else {
            self.gps_bounds.convert(gps)
        }
    }
}
