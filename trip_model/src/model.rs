use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

use map_model::RoadNetwork;

use crate::theta::{cumulative_distribution, softmax};
use crate::{
    DataFiles, DatasetKey, ModelConfig, SavedModel, SavedTrip, Theta, TimeBins, Trip, TripID,
};

/// One row of theta, along with the cumulative distribution derived from it. They're always
/// updated together.
struct BinState {
    theta: Vec<f64>,
    cumulative: Vec<f64>,
}

impl BinState {
    fn new(theta: Vec<f64>) -> BinState {
        let mut state = BinState {
            theta,
            cumulative: Vec::new(),
        };
        state.prepare_fast_sampling();
        state
    }

    fn prepare_fast_sampling(&mut self) {
        self.cumulative = cumulative_distribution(&softmax(&self.theta));
    }
}

/// Trips and theta loaded from one file, ready for sampling.
pub struct Dataset {
    key: DatasetKey,
    /// Sorted by ID
    trips: Vec<Arc<Trip>>,
    time_bins: TimeBins,
    bins: Vec<RwLock<BinState>>,
}

impl Dataset {
    /// Rebuilds every trip against the map. If the saved trips aren't sorted by ID, they're
    /// sorted here, along with theta's columns.
    pub fn new<M: RoadNetwork + ?Sized>(
        key: DatasetKey,
        map: &M,
        saved: SavedModel,
    ) -> Result<Dataset> {
        let SavedModel { trips, theta } = saved.into_sorted()?;
        let time_bins = theta.time_bins();

        let bins: Vec<RwLock<BinState>> = theta
            .into_rows()
            .into_iter()
            .map(|row| RwLock::new(BinState::new(row)))
            .collect();
        let mut rebuilt = Vec::with_capacity(trips.len());
        for saved in trips {
            rebuilt.push(Arc::new(Trip::from_intersections(
                saved.id,
                saved.intersections,
                map,
            )?));
        }

        Ok(Dataset {
            key,
            trips: rebuilt,
            time_bins,
            bins,
        })
    }

    pub fn key(&self) -> DatasetKey {
        self.key
    }

    pub fn trips(&self) -> &[Arc<Trip>] {
        &self.trips
    }

    pub fn time_bins(&self) -> TimeBins {
        self.time_bins
    }

    /// The column of a trip in theta
    pub fn trip_index(&self, id: TripID) -> Option<usize> {
        self.trips.binary_search_by_key(&id, |t| t.id()).ok()
    }

    /// The probability of picking each trip during some bin
    pub fn distribution(&self, bin: usize) -> Vec<f64> {
        softmax(&read(&self.bins[bin]).theta)
    }

    /// A copy of the current theta
    pub fn theta(&self) -> Result<Theta> {
        Theta::new(self.bins.iter().map(|b| read(b).theta.clone()).collect())
    }

    pub fn to_saved(&self) -> Result<SavedModel> {
        SavedModel::new(
            self.trips
                .iter()
                .map(|t| SavedTrip {
                    id: t.id(),
                    intersections: t.intersections().to_vec(),
                })
                .collect(),
            self.theta()?,
        )
    }

    /// `draw` is uniform in [0, 1). Picks the first trip whose cumulative probability reaches the
    /// draw, or the last trip if rounding leaves the draw past the end.
    fn sample(&self, bin: usize, draw: f64) -> Option<Arc<Trip>> {
        let state = read(&self.bins[bin]);
        let idx = state.cumulative.partition_point(|x| *x < draw);
        if idx < state.cumulative.len() {
            Some(self.trips[idx].clone())
        } else {
            self.trips.last().cloned()
        }
    }

    /// One policy gradient step for a bin: every trip's weight moves by
    /// `alpha * (p[j] - 1{j = chosen}) * reward`. The reward is a cost, so a long search makes
    /// the chosen trip less likely.
    fn apply_reward(&self, bin: usize, chosen: usize, reward: f64, alpha: f64) {
        let mut state = write(&self.bins[bin]);
        let probs = softmax(&state.theta);
        for (j, (theta, p)) in state.theta.iter_mut().zip(probs).enumerate() {
            let target = if j == chosen { 1.0 } else { 0.0 };
            *theta += alpha * (p - target) * reward;
        }
        state.prepare_fast_sampling();
    }
}

/// The trips and their sampling distributions, shared by every agent in a simulation.
///
/// Datasets are swapped in whole when the calendar month changes, and kept around in case that
/// month comes up again. A dataset that fails to load is never retried, and whatever was active
/// before stays active.
pub struct TripsDataModel<M> {
    map: Arc<M>,
    files: DataFiles,
    active: RwLock<Option<Arc<Dataset>>>,
    // Also serializes loading
    cache: Mutex<HashMap<DatasetKey, Arc<Dataset>>>,
    failed: Mutex<BTreeSet<DatasetKey>>,
    rng: Mutex<XorShiftRng>,
}

impl<M: RoadNetwork> TripsDataModel<M> {
    /// Tries to load the default dataset right away. If that fails, sampling won't work until
    /// some monthly dataset loads.
    pub fn new(map: Arc<M>, files: DataFiles, rng_seed: u64) -> TripsDataModel<M> {
        let model = TripsDataModel {
            map,
            files,
            active: RwLock::new(None),
            cache: Mutex::new(HashMap::new()),
            failed: Mutex::new(BTreeSet::new()),
            rng: Mutex::new(XorShiftRng::seed_from_u64(rng_seed)),
        };
        model.ensure_data_loaded(0);
        model
    }

    pub fn from_config(map: Arc<M>, config: &ModelConfig) -> TripsDataModel<M> {
        TripsDataModel::new(map, config.data.clone(), config.rng_seed)
    }

    /// Uses one in-memory model for all times, without touching the disk.
    pub fn from_saved(
        map: Arc<M>,
        saved: SavedModel,
        rng_seed: u64,
    ) -> Result<TripsDataModel<M>> {
        let dataset = Arc::new(Dataset::new(DatasetKey::Default, &*map, saved)?);
        let mut cache = HashMap::new();
        cache.insert(DatasetKey::Default, dataset.clone());
        Ok(TripsDataModel {
            map,
            files: DataFiles {
                default_path: String::new(),
                monthly_template: None,
            },
            active: RwLock::new(Some(dataset)),
            cache: Mutex::new(cache),
            failed: Mutex::new(BTreeSet::new()),
            rng: Mutex::new(XorShiftRng::seed_from_u64(rng_seed)),
        })
    }

    pub fn map(&self) -> &Arc<M> {
        &self.map
    }

    /// Makes sure the dataset for some time is active. Non-positive times use the default
    /// dataset. Failures are logged, not returned.
    pub fn ensure_data_loaded(&self, time: i64) {
        let key = match self.files.key_for_time(time) {
            Ok(key) => key,
            Err(err) => {
                error!("Can't pick a dataset for time {}: {}", time, err);
                return;
            }
        };
        if self.active_key() == Some(key) {
            return;
        }

        let mut cache = lock(&self.cache);
        if let Some(dataset) = cache.get(&key) {
            debug!("Switching to the cached {}", key);
            *write(&self.active) = Some(dataset.clone());
            return;
        }
        let mut failed = lock(&self.failed);
        if failed.contains(&key) {
            return;
        }

        let path = self.files.path(key);
        let expected_bins = self.active().map(|d| d.time_bins.num_bins());
        let loaded = SavedModel::load(&path)
            .and_then(|saved| Dataset::new(key, &*self.map, saved))
            .and_then(|dataset| match expected_bins {
                // Every dataset in one run has to share the same time bins
                Some(expected) if expected != dataset.time_bins.num_bins() => bail!(
                    "it has {} time bins, but the active model has {}",
                    dataset.time_bins.num_bins(),
                    expected
                ),
                _ => Ok(dataset),
            });
        match loaded {
            Ok(dataset) => {
                info!(
                    "Loaded {} from {}: {} trips, {} time bins",
                    key,
                    path.display(),
                    abstutil::prettyprint_usize(dataset.trips.len()),
                    dataset.time_bins.num_bins()
                );
                let dataset = Arc::new(dataset);
                cache.insert(key, dataset.clone());
                *write(&self.active) = Some(dataset);
            }
            Err(err) => {
                error!(
                    "Couldn't load {} from {}, keeping the previous model: {:#}",
                    key,
                    path.display(),
                    err
                );
                failed.insert(key);
            }
        }
    }

    pub fn active(&self) -> Option<Arc<Dataset>> {
        read(&self.active).clone()
    }

    pub fn active_key(&self) -> Option<DatasetKey> {
        read(&self.active).as_ref().map(|d| d.key)
    }

    fn require_active(&self) -> Result<Arc<Dataset>> {
        match self.active() {
            Some(dataset) => Ok(dataset),
            None => bail!("No trip model is loaded"),
        }
    }

    /// Which time bin of the active dataset does a time fall into?
    pub fn assign_time_index(&self, time: i64) -> Result<usize> {
        Ok(self.require_active()?.time_bins.index(time))
    }

    /// The softmax of one row of the active theta
    pub fn distribution(&self, bin: usize) -> Result<Vec<f64>> {
        let dataset = self.require_active()?;
        if bin >= dataset.bins.len() {
            bail!("There's no time bin {}", bin);
        }
        Ok(dataset.distribution(bin))
    }

    /// Picks a trip at random, weighted by the distribution for the time.
    pub fn sample_trip(&self, time: i64) -> Result<Arc<Trip>> {
        self.ensure_data_loaded(time);
        let dataset = self.require_active()?;
        let bin = dataset.time_bins.index(time);
        let draw: f64 = lock(&self.rng).gen();
        match dataset.sample(bin, draw) {
            Some(trip) => Ok(trip),
            None => bail!("The {} has no trips", dataset.key),
        }
    }

    /// Learns from one search. `reward` is how long the search took, in seconds; it's applied to
    /// the time bin where the search started.
    pub fn apply_reward(
        &self,
        search_start: i64,
        trip: TripID,
        reward: f64,
        alpha: f64,
    ) -> Result<()> {
        let dataset = self.require_active()?;
        let chosen = match dataset.trip_index(trip) {
            Some(idx) => idx,
            None => bail!("{} isn't part of the {}", trip, dataset.key),
        };
        let bin = dataset.time_bins.index(search_start);
        dataset.apply_reward(bin, chosen, reward, alpha);
        Ok(())
    }

    /// Saves the active dataset, including everything learned so far.
    pub fn write_data<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.require_active()?.to_saved()?.save(path)
    }
}

// A panic while holding one of these locks can't leave the data half-updated, so poisoning is
// ignored.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<T> {
    lock.read().unwrap_or_else(|err| err.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<T> {
    lock.write().unwrap_or_else(|err| err.into_inner())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}

#[cfg(test)]
mod tests {
    use geom::{Duration, Pt2D};
    use map_model::{Intersection, IntersectionID, Map, Road};

    use super::*;

    // A square 1, 2, 3, 4 with two-way 1 minute roads along the edges
    fn square() -> Arc<Map> {
        let mut roads = Vec::new();
        for (a, b) in [(1, 2), (2, 3), (3, 4), (4, 1)] {
            for (src, dst) in [(a, b), (b, a)] {
                roads.push(Road {
                    src_i: IntersectionID(src),
                    dst_i: IntersectionID(dst),
                    travel_time: Duration::minutes(1),
                });
            }
        }
        Arc::new(
            Map::new(
                vec![
                    Intersection::new(IntersectionID(1), Pt2D::new(0.0, 0.0)),
                    Intersection::new(IntersectionID(2), Pt2D::new(100.0, 0.0)),
                    Intersection::new(IntersectionID(3), Pt2D::new(100.0, 100.0)),
                    Intersection::new(IntersectionID(4), Pt2D::new(0.0, 100.0)),
                ],
                roads,
            )
            .unwrap(),
        )
    }

    fn saved(theta_row: Vec<f64>) -> SavedModel {
        let trips = vec![
            SavedTrip {
                id: TripID(1),
                intersections: vec![IntersectionID(1), IntersectionID(2)],
            },
            SavedTrip {
                id: TripID(2),
                intersections: vec![IntersectionID(2), IntersectionID(3)],
            },
            SavedTrip {
                id: TripID(3),
                intersections: vec![IntersectionID(3), IntersectionID(4), IntersectionID(1)],
            },
        ];
        SavedModel::new(trips, Theta::new(vec![theta_row; 168]).unwrap()).unwrap()
    }

    #[test]
    fn uniform_sampling_converges() {
        let model = TripsDataModel::from_saved(square(), saved(vec![0.0, 0.0, 0.0]), 42).unwrap();
        let dist = model.distribution(5).unwrap();
        for p in &dist {
            assert!((p - 1.0 / 3.0).abs() < 1e-12);
        }

        let mut counts = [0; 3];
        for _ in 0..3000 {
            let trip = model.sample_trip(3600 * 5).unwrap();
            counts[(trip.id().0 - 1) as usize] += 1;
        }
        // The standard deviation is about 26
        for count in counts {
            assert!((850..=1150).contains(&count), "{:?}", counts);
        }
    }

    #[test]
    fn skewed_sampling() {
        let model =
            TripsDataModel::from_saved(square(), saved(vec![0.0, -100.0, 0.0]), 7).unwrap();
        for _ in 0..200 {
            assert_ne!(model.sample_trip(0).unwrap().id(), TripID(2));
        }
    }

    #[test]
    fn reward_moves_theta() {
        let model = TripsDataModel::from_saved(square(), saved(vec![0.0, 0.0, 0.0]), 42).unwrap();
        let before = model.active().unwrap().theta().unwrap();

        // A search starting in bin 2 that took 10 minutes
        model
            .apply_reward(2 * 3600 + 5, TripID(2), 600.0, 0.001)
            .unwrap();
        let after = model.active().unwrap().theta().unwrap();

        assert!(after.row(2)[1] < before.row(2)[1]);
        assert!(after.row(2)[0] > before.row(2)[0]);
        assert!(after.row(2)[2] > before.row(2)[2]);
        // (1/3 - 1) * 600 * 0.001
        assert!((after.row(2)[1] + 0.4).abs() < 1e-12);
        // Other bins don't change
        assert_eq!(after.row(3), before.row(3));

        // The sampling cache follows
        let dist = model.distribution(2).unwrap();
        assert!(dist[1] < dist[0]);

        assert!(model.apply_reward(0, TripID(99), 600.0, 0.001).is_err());
    }

    #[test]
    fn unsorted_files_keep_columns_aligned() {
        let map = square();
        let saved = SavedModel {
            trips: vec![
                SavedTrip {
                    id: TripID(3),
                    intersections: vec![IntersectionID(3), IntersectionID(4)],
                },
                SavedTrip {
                    id: TripID(1),
                    intersections: vec![IntersectionID(1), IntersectionID(2)],
                },
            ],
            theta: Theta::new(vec![vec![3.0, 1.0]; 7]).unwrap(),
        };
        let dataset = Dataset::new(DatasetKey::Default, &*map, saved).unwrap();
        assert_eq!(dataset.trips()[0].id(), TripID(1));
        assert_eq!(dataset.theta().unwrap().row(0), &[1.0, 3.0]);
        assert_eq!(dataset.trip_index(TripID(3)), Some(1));
        assert_eq!(dataset.trips()[1].duration(), Duration::minutes(2));
    }

    #[test]
    fn duplicate_trips_are_rejected() {
        let map = square();
        let trip = SavedTrip {
            id: TripID(1),
            intersections: vec![IntersectionID(1), IntersectionID(2)],
        };
        let saved = SavedModel {
            trips: vec![trip.clone(), trip],
            theta: Theta::new(vec![vec![0.0, 0.0]; 7]).unwrap(),
        };
        assert!(Dataset::new(DatasetKey::Default, &*map, saved).is_err());
    }

    #[test]
    fn concurrent_rewards_are_serialized() {
        let model = Arc::new(
            TripsDataModel::from_saved(square(), saved(vec![0.0, 0.5, -0.5]), 42).unwrap(),
        );
        let shared_bin = 2 * 3600;
        let own_bin = |t: i64| (10 + t) * 3600;
        let own_trip = |t: i64| TripID(t % 3 + 1);

        let mut handles = Vec::new();
        for t in 0..4 {
            let model = model.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    model
                        .apply_reward(shared_bin, TripID(2), 60.0, 0.001)
                        .unwrap();
                    model
                        .apply_reward(own_bin(t), own_trip(t), 30.0 * (t + 1) as f64, 0.001)
                        .unwrap();
                }
            }));
        }
        for _ in 0..2 {
            let model = model.clone();
            handles.push(std::thread::spawn(move || {
                let dataset = model.active().unwrap();
                for _ in 0..200 {
                    for bin in [2, 10, 11, 12, 13] {
                        // The sampling cache always matches the row it was built from
                        let state = read(&dataset.bins[bin]);
                        assert_eq!(
                            state.cumulative,
                            cumulative_distribution(&softmax(&state.theta))
                        );
                        drop(state);

                        let total: f64 = model.distribution(bin).unwrap().iter().sum();
                        assert!((total - 1.0).abs() < 1e-9);
                    }
                    model.sample_trip(shared_bin).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // The same updates, one after another
        let expected =
            TripsDataModel::from_saved(square(), saved(vec![0.0, 0.5, -0.5]), 42).unwrap();
        for _ in 0..200 {
            expected
                .apply_reward(shared_bin, TripID(2), 60.0, 0.001)
                .unwrap();
        }
        for t in 0..4 {
            for _ in 0..50 {
                expected
                    .apply_reward(own_bin(t), own_trip(t), 30.0 * (t + 1) as f64, 0.001)
                    .unwrap();
            }
        }
        assert_eq!(
            model.active().unwrap().theta().unwrap(),
            expected.active().unwrap().theta().unwrap()
        );
        for bin in 0..168 {
            let total: f64 = model.distribution(bin).unwrap().iter().sum();
            assert!((total - 1.0).abs() < 1e-9, "bin {} sums to {}", bin, total);
        }
    }

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("trip_model_{}_{}", name, std::process::id()));
        fs_err::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn monthly_reloads() {
        let dir = temp_dir("monthly_reloads");
        let files = DataFiles {
            default_path: dir.join("data.bin").display().to_string(),
            monthly_template: Some(dir.join("data_{month}.bin").display().to_string()),
        };
        saved(vec![0.0, 0.0, 0.0])
            .save(files.path(DatasetKey::Default))
            .unwrap();
        saved(vec![5.0, 0.0, 0.0])
            .save(files.path(DatasetKey::Month(1)))
            .unwrap();
        // February is corrupt
        fs_err::write(files.path(DatasetKey::Month(2)), [0, 0, 0, 9]).unwrap();

        let model = TripsDataModel::new(square(), files.clone(), 42);
        assert_eq!(model.active_key(), Some(DatasetKey::Default));

        // 2016-01-10
        let january = 1_452_384_000;
        model.ensure_data_loaded(january);
        assert_eq!(model.active_key(), Some(DatasetKey::Month(1)));
        assert!(model.distribution(0).unwrap()[0] > 0.9);

        // 2016-02-10 fails, so January stays
        let february = january + 31 * 86400;
        model.ensure_data_loaded(february);
        assert_eq!(model.active_key(), Some(DatasetKey::Month(1)));
        assert!(model.sample_trip(february).is_ok());

        // The default comes from the cache, even after the file disappears
        fs_err::remove_file(files.path(DatasetKey::Default)).unwrap();
        model.ensure_data_loaded(-1);
        assert_eq!(model.active_key(), Some(DatasetKey::Default));

        // Write out what was learned and read it back
        model.apply_reward(0, TripID(1), 60.0, 0.01).unwrap();
        let out = dir.join("learned.bin");
        model.write_data(&out).unwrap();
        let reloaded = SavedModel::load(&out).unwrap();
        assert_eq!(reloaded.theta, model.active().unwrap().theta().unwrap());

        fs_err::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn reloads_keep_the_time_bins() {
        let dir = temp_dir("reloads_keep_the_time_bins");
        let files = DataFiles {
            default_path: dir.join("data.bin").display().to_string(),
            monthly_template: Some(dir.join("data_{month}.bin").display().to_string()),
        };
        saved(vec![0.0, 0.0, 0.0])
            .save(files.path(DatasetKey::Default))
            .unwrap();
        // January is split into days, not hours
        SavedModel::new(
            saved(vec![0.0, 0.0, 0.0]).trips,
            Theta::new(vec![vec![1.0, 0.0, 0.0]; 7]).unwrap(),
        )
        .unwrap()
        .save(files.path(DatasetKey::Month(1)))
        .unwrap();

        let model = TripsDataModel::new(square(), files, 42);
        let january = 1_452_384_000;
        model.ensure_data_loaded(january);
        assert_eq!(model.active_key(), Some(DatasetKey::Default));
        assert_eq!(model.active().unwrap().time_bins().num_bins(), 168);
        assert!(model.sample_trip(january).is_ok());

        fs_err::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_default() {
        let dir = temp_dir("missing_default");
        let model = TripsDataModel::new(
            square(),
            DataFiles::single(dir.join("nothing.bin")),
            42,
        );
        assert_eq!(model.active_key(), None);
        assert!(model.sample_trip(0).is_err());
        assert!(model.assign_time_index(0).is_err());
        fs_err::remove_dir_all(&dir).unwrap();
    }
}
