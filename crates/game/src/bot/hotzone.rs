use glam::Vec2;

/// Groups sightings from one scan. A sighting joins the first cluster
/// whose seed lies within the radius.
#[derive(Debug, Clone)]
pub struct SightingClusters {
    radius: f32,
    clusters: Vec<(usize, Vec2)>,
}

impl SightingClusters {
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            clusters: Vec::new(),
        }
    }

    pub fn observe(&mut self, pos: Vec2) {
        match self
            .clusters
            .iter_mut()
            .find(|(_, seed)| seed.distance(pos) < self.radius)
        {
            Some((count, _)) => *count += 1,
            None => self.clusters.push((1, pos)),
        }
    }

    pub fn dense(&self, min_samples: usize) -> impl Iterator<Item = Vec2> + '_ {
        self.clusters
            .iter()
            .filter(move |(count, _)| *count >= min_samples)
            .map(|(_, seed)| *seed)
    }
}

/// Places where adversaries were repeatedly seen together.
#[derive(Debug, Clone)]
pub struct HotZones {
    dedup_radius: f32,
    zones: Vec<Vec2>,
}

impl HotZones {
    pub fn new(dedup_radius: f32) -> Self {
        Self {
            dedup_radius,
            zones: Vec::new(),
        }
    }

    pub fn record(&mut self, pos: Vec2) -> bool {
        if self
            .zones
            .iter()
            .any(|zone| zone.distance(pos) < self.dedup_radius)
        {
            return false;
        }
        self.zones.push(pos);
        true
    }

    pub fn nearest(&self, pos: Vec2) -> Option<Vec2> {
        self.zones
            .iter()
            .copied()
            .min_by(|a, b| a.distance(pos).total_cmp(&b.distance(pos)))
    }

    pub fn zones(&self) -> &[Vec2] {
        &self.zones
    }

    pub fn clear(&mut self) {
        self.zones.clear();
    }
}
