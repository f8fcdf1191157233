//! SSSP problem manager
//!
//! A [`Problem`] owns one [`DataSlice`] per device together with the partition
//! tables that map global vertex ids to `(device, local index)`. It partitions
//! and uploads the graph once, resets per source, and gathers results back
//! into global order.

use super::data_slice::{DataSlice, FrontierType, UNREACHED};
use super::functor::NO_PREDECESSOR;
use super::result::{GatherReport, SsspResult};
use crate::config::{validate_sizing, GatherPolicy, SsspConfig};
use crate::device::{AssociateRegistry, DeviceId, DeviceSet};
use crate::error::{Result, SsspError};
use crate::partition::{partition_graph, PartitionTable, SubGraph};
use crate::storage::{CsrGraph, NodeId};

/// Lifecycle of a [`Problem`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemState {
    /// Created, graph not loaded
    Uninitialized,
    /// Graph partitioned and uploaded
    Initialized,
    /// Reset for a source, ready to run
    Ready,
    /// At least one round has run
    Running,
    /// No work left
    Converged,
    /// Results gathered
    Extracted,
}

impl ProblemState {
    /// Lowercase state name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Converged => "converged",
            Self::Extracted => "extracted",
        }
    }
}

/// Multi-device single-source shortest path problem
///
/// # Example
///
/// ```
/// use trueno_sssp::{CsrGraph, DeviceSet, Enactor, FrontierType, NodeId, Problem, SsspConfig};
///
/// let edges = vec![
///     (NodeId(0), NodeId(1), 2.0),
///     (NodeId(1), NodeId(2), 1.0),
///     (NodeId(0), NodeId(2), 5.0),
/// ];
/// let graph = CsrGraph::from_edge_list(&edges).unwrap();
///
/// let mut problem = Problem::new(DeviceSet::single(), SsspConfig::default()).unwrap();
/// problem.init(&graph).unwrap();
/// problem.reset(NodeId(0), FrontierType::Mixed, 2.0).unwrap();
/// Enactor::new(&mut problem).unwrap().enact().unwrap();
///
/// let result = problem.extract_result().unwrap();
/// assert_eq!(result.distance(NodeId(2)), Some(3.0));
/// ```
#[derive(Debug)]
pub struct Problem {
    config: SsspConfig,
    devices: DeviceSet,
    state: ProblemState,
    num_nodes: usize,
    source: Option<NodeId>,
    table: PartitionTable,
    subgraphs: Vec<SubGraph>,
    slices: Vec<DataSlice>,
    registry: AssociateRegistry,
}

impl Problem {
    /// Problem over `devices`, nothing allocated yet
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an empty device set or an out-of-range option
    pub fn new(devices: DeviceSet, config: SsspConfig) -> Result<Self> {
        config.validate()?;
        if devices.is_empty() {
            return Err(SsspError::InvalidConfig(
                "at least one device is required".to_string(),
            ));
        }
        let num_devices = devices.len();
        Ok(Self {
            config,
            devices,
            state: ProblemState::Uninitialized,
            num_nodes: 0,
            source: None,
            table: PartitionTable::from_owners(Vec::new(), num_devices),
            subgraphs: Vec::new(),
            slices: Vec::new(),
            registry: AssociateRegistry::new(),
        })
    }

    /// Partition `graph` and initialize one data slice per device
    ///
    /// On failure the slices built so far (and their allocations) stay owned
    /// by the problem until it is dropped or `init` is retried.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the problem is uninitialized
    /// - `InvalidGraph` / `InvalidConfig` from partitioning
    /// - the first `DeviceError` raised while allocating or uploading
    pub fn init(&mut self, graph: &CsrGraph) -> Result<()> {
        self.require("init", &[ProblemState::Uninitialized])?;
        if u32::try_from(graph.num_nodes()).map_or(true, |n| n == u32::MAX) {
            return Err(SsspError::InvalidGraph(format!(
                "{} nodes exceed the 32-bit vertex id space",
                graph.num_nodes()
            )));
        }

        let (table, subgraphs) =
            partition_graph(graph, self.devices.len(), &self.config.partition_method)?;
        self.table = table;
        self.subgraphs = subgraphs;
        self.num_nodes = graph.num_nodes();

        // Leftovers from an earlier failed init
        self.slices.clear();
        self.registry = AssociateRegistry::new();

        let num_devices = self.devices.len();
        for (id, subgraph) in self.devices.ids().zip(&self.subgraphs) {
            let ctx = self.devices.select(id)?;
            let mut slice = DataSlice::new(id, self.config.mark_paths);
            let outcome = slice.init(&ctx, subgraph, &self.config, num_devices, &mut self.registry);
            self.slices.push(slice);
            outcome?;
        }

        self.state = ProblemState::Initialized;
        tracing::info!(
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            devices = num_devices,
            mark_paths = self.config.mark_paths,
            "Initialized SSSP problem"
        );
        Ok(())
    }

    /// Prepare every device for a run from `source`
    ///
    /// Sentinel-fills labels, ranks, predecessors and visited marks, then
    /// seeds the owner's frontier with the source alone. Buffers are reused
    /// across resets. If a device fails partway through, the problem falls
    /// back to [`ProblemState::Initialized`] and needs another reset before it
    /// can run.
    ///
    /// # Errors
    ///
    /// - `InvalidState` before `init`
    /// - `InvalidSource` if `source` is not a vertex of the graph
    /// - `InvalidConfig` for a queue sizing factor below 1
    /// - the first `DeviceError` raised by any device
    pub fn reset(
        &mut self,
        source: NodeId,
        frontier_type: FrontierType,
        queue_sizing_factor: f64,
    ) -> Result<()> {
        self.require(
            "reset",
            &[
                ProblemState::Initialized,
                ProblemState::Ready,
                ProblemState::Running,
                ProblemState::Converged,
                ProblemState::Extracted,
            ],
        )?;
        let queue_sizing = validate_sizing("queue_sizing_factor", queue_sizing_factor, 1.0)?;
        if source.0 as usize >= self.num_nodes {
            return Err(SsspError::InvalidSource {
                vertex: source.0,
                num_nodes: self.num_nodes,
            });
        }
        let (owner, local) = self.table.locate(source.0).ok_or_else(|| {
            let (device, local) = self.table.entry(source.0).unwrap_or((u32::MAX, u32::MAX));
            SsspError::IndexOutOfRange {
                vertex: source.0,
                device,
                local,
            }
        })?;

        if let Err(err) = self.reset_slices(owner, local, frontier_type, queue_sizing) {
            self.state = ProblemState::Initialized;
            self.source = None;
            tracing::warn!(source = source.0, error = %err, "Reset failed");
            return Err(err);
        }

        self.source = Some(source);
        self.state = ProblemState::Ready;
        tracing::debug!(
            source = source.0,
            owner = %owner,
            local,
            frontier_type = ?frontier_type,
            "Reset SSSP problem"
        );
        Ok(())
    }

    fn reset_slices(
        &mut self,
        owner: DeviceId,
        local: u32,
        frontier_type: FrontierType,
        queue_sizing: f64,
    ) -> Result<()> {
        for slice in &mut self.slices {
            let ctx = self.devices.select(slice.device())?;
            slice.reset(&ctx, frontier_type, queue_sizing)?;
            if slice.device() == owner {
                slice.seed_source(&ctx, local)?;
            }
        }
        Ok(())
    }

    /// Copy labels (and predecessors) into caller buffers in global order
    ///
    /// Unreached vertices and the source read `None` for their predecessor,
    /// and so does every vertex a best-effort gather skips. `out_preds`
    /// requires path tracking. Predecessors are final once the run has
    /// converged.
    ///
    /// # Errors
    ///
    /// - `InvalidState` before `reset`
    /// - `InvalidConfig` if predecessors are requested without path tracking
    /// - `OutputLength` for a buffer not sized to the node count
    /// - the first `DeviceError` raised while moving data to the host
    /// - `IndexOutOfRange` under [`GatherPolicy::Strict`]
    pub fn extract(
        &mut self,
        out_labels: &mut [Option<f32>],
        mut out_preds: Option<&mut [Option<NodeId>]>,
    ) -> Result<GatherReport> {
        self.require(
            "extract",
            &[
                ProblemState::Ready,
                ProblemState::Running,
                ProblemState::Converged,
                ProblemState::Extracted,
            ],
        )?;
        check_len("labels", self.num_nodes, out_labels.len())?;
        if let Some(preds) = out_preds.as_deref() {
            if !self.config.mark_paths {
                return Err(SsspError::InvalidConfig(
                    "predecessors requested but path tracking is disabled".to_string(),
                ));
            }
            check_len("preds", self.num_nodes, preds.len())?;
        }

        for slice in &mut self.slices {
            let ctx = self.devices.select(slice.device())?;
            slice.download(&ctx)?;
        }

        let mut report = GatherReport::default();
        if self.slices.len() == 1 {
            let slice = &self.slices[0];
            let labels = slice.labels().host()?;
            for (out, &label) in out_labels.iter_mut().zip(labels) {
                *out = reached(label);
            }
            if let (Some(out), Some(preds)) = (out_preds.as_deref_mut(), slice.preds()) {
                for (out, &slot) in out.iter_mut().zip(preds.host()?) {
                    *out = predecessor(slot);
                }
            }
            report.gathered = self.num_nodes;
        } else {
            self.gather(out_labels, out_preds.as_deref_mut(), &mut report)?;
        }

        self.state = ProblemState::Extracted;
        tracing::debug!(
            gathered = report.gathered,
            skipped = report.skipped.len(),
            "Extracted SSSP results"
        );
        Ok(report)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn gather(
        &self,
        out_labels: &mut [Option<f32>],
        mut out_preds: Option<&mut [Option<NodeId>]>,
        report: &mut GatherReport,
    ) -> Result<()> {
        for vertex in 0..self.num_nodes as u32 {
            // A vertex missing from the table reads as an out-of-range entry
            let (device, local) = self.table.entry(vertex).unwrap_or((u32::MAX, u32::MAX));
            let slice = self
                .slices
                .get(device as usize)
                .filter(|s| (local as usize) < s.num_owned());
            let Some(slice) = slice else {
                let err = SsspError::IndexOutOfRange {
                    vertex,
                    device,
                    local,
                };
                match self.config.gather_policy {
                    GatherPolicy::Strict => return Err(err),
                    GatherPolicy::BestEffort => {
                        tracing::warn!(vertex, device, local, "Skipping out-of-range table entry");
                        report.skipped.push(err);
                        out_labels[vertex as usize] = None;
                        if let Some(out) = out_preds.as_deref_mut() {
                            out[vertex as usize] = None;
                        }
                        continue;
                    }
                }
            };

            out_labels[vertex as usize] = reached(slice.labels().host()?[local as usize]);
            if let (Some(out), Some(preds)) = (out_preds.as_deref_mut(), slice.preds()) {
                out[vertex as usize] = predecessor(preds.host()?[local as usize]);
            }
            report.gathered += 1;
        }
        Ok(())
    }

    /// Gather into a fresh [`SsspResult`]
    ///
    /// # Errors
    ///
    /// As [`Problem::extract`]
    pub fn extract_result(&mut self) -> Result<SsspResult> {
        let source = self.source.ok_or(SsspError::InvalidState {
            operation: "extract",
            state: self.state.as_str(),
        })?;
        let mut labels = vec![None; self.num_nodes];
        let mut preds = self.config.mark_paths.then(|| vec![None; self.num_nodes]);
        self.extract(&mut labels, preds.as_deref_mut())?;
        Ok(SsspResult {
            source,
            labels,
            preds,
        })
    }

    /// Current device labels in global order, without changing state
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` before `reset`, `IndexOutOfRange` for an
    /// inconsistent table entry
    #[allow(clippy::cast_possible_truncation)]
    pub fn labels_snapshot(&self) -> Result<Vec<Option<f32>>> {
        self.require(
            "snapshot labels",
            &[
                ProblemState::Ready,
                ProblemState::Running,
                ProblemState::Converged,
                ProblemState::Extracted,
            ],
        )?;
        let arrays = self
            .slices
            .iter()
            .map(|s| s.labels().device_array())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        (0..self.num_nodes as u32)
            .map(|vertex| {
                let (device, local) = self.table.locate(vertex).ok_or_else(|| {
                    let (device, local) = self.table.entry(vertex).unwrap_or((u32::MAX, u32::MAX));
                    SsspError::IndexOutOfRange {
                        vertex,
                        device,
                        local,
                    }
                })?;
                Ok(reached(arrays[device.index()].load(local as usize)))
            })
            .collect()
    }

    fn require(&self, operation: &'static str, allowed: &[ProblemState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SsspError::InvalidState {
                operation,
                state: self.state.as_str(),
            })
        }
    }

    pub(crate) fn set_state(&mut self, state: ProblemState) {
        self.state = state;
    }

    /// Devices, subgraphs, slices and associates, borrowed separately
    pub(crate) fn parts_mut(
        &mut self,
    ) -> (&DeviceSet, &[SubGraph], &mut [DataSlice], &AssociateRegistry) {
        (
            &self.devices,
            &self.subgraphs,
            &mut self.slices,
            &self.registry,
        )
    }

    /// Lifecycle state
    #[must_use]
    pub const fn state(&self) -> ProblemState {
        self.state
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &SsspConfig {
        &self.config
    }

    /// Devices the problem runs on
    #[must_use]
    pub const fn devices(&self) -> &DeviceSet {
        &self.devices
    }

    /// Number of global vertices
    #[must_use]
    pub const fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Source of the current run
    #[must_use]
    pub const fn source(&self) -> Option<NodeId> {
        self.source
    }

    /// Partition and conversion tables
    #[must_use]
    pub const fn table(&self) -> &PartitionTable {
        &self.table
    }

    /// Per-device subgraphs
    #[must_use]
    pub fn subgraphs(&self) -> &[SubGraph] {
        &self.subgraphs
    }

    /// Data slice of `device`
    #[must_use]
    pub fn data_slice(&self, device: DeviceId) -> Option<&DataSlice> {
        self.slices.get(device.index())
    }

    /// Data slices, one per initialized device
    #[must_use]
    pub fn data_slices(&self) -> &[DataSlice] {
        &self.slices
    }

    /// Buffers exchanged between devices
    #[must_use]
    pub const fn associates(&self) -> &AssociateRegistry {
        &self.registry
    }

    #[cfg(test)]
    pub(crate) fn table_mut(&mut self) -> &mut PartitionTable {
        &mut self.table
    }
}

impl Drop for Problem {
    fn drop(&mut self) {
        tracing::debug!(
            slices = self.slices.len(),
            state = self.state.as_str(),
            "Releasing SSSP problem"
        );
    }
}

fn reached(label: f32) -> Option<f32> {
    (label != UNREACHED).then_some(label)
}

fn predecessor(slot: u32) -> Option<NodeId> {
    (slot != NO_PREDECESSOR).then_some(NodeId(slot))
}

fn check_len(name: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(SsspError::OutputLength {
            name,
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{AssociateKind, DeviceMemoryLimits, Location};
    use crate::error::DeviceError;
    use crate::partition::PartitionMethod;
    use crate::sssp::Enactor;

    fn scenario_graph() -> CsrGraph {
        let edges = vec![
            (NodeId(0), NodeId(1), 2.0),
            (NodeId(0), NodeId(2), 5.0),
            (NodeId(1), NodeId(2), 1.0),
            (NodeId(1), NodeId(3), 4.0),
            (NodeId(2), NodeId(3), 1.0),
            (NodeId(3), NodeId(4), 3.0),
        ];
        CsrGraph::from_edge_list(&edges).unwrap()
    }

    fn paths_config() -> SsspConfig {
        SsspConfig::default()
            .with_mark_paths(true)
            .with_partition_method(PartitionMethod::Block)
    }

    #[test]
    fn test_lifecycle_states() {
        let mut problem = Problem::new(DeviceSet::single(), paths_config()).unwrap();
        assert_eq!(problem.state(), ProblemState::Uninitialized);

        problem.init(&scenario_graph()).unwrap();
        assert_eq!(problem.state(), ProblemState::Initialized);
        assert_eq!(problem.data_slices().len(), 1);

        problem.reset(NodeId(0), FrontierType::Mixed, 2.0).unwrap();
        assert_eq!(problem.state(), ProblemState::Ready);

        Enactor::new(&mut problem).unwrap().enact().unwrap();
        assert_eq!(problem.state(), ProblemState::Converged);

        problem.extract_result().unwrap();
        assert_eq!(problem.state(), ProblemState::Extracted);

        problem.reset(NodeId(1), FrontierType::Mixed, 2.0).unwrap();
        assert_eq!(problem.state(), ProblemState::Ready);
    }

    #[test]
    fn test_wrong_state_rejected() {
        let mut problem = Problem::new(DeviceSet::single(), paths_config()).unwrap();
        let err = problem
            .reset(NodeId(0), FrontierType::Mixed, 2.0)
            .unwrap_err();
        assert_eq!(
            err,
            SsspError::InvalidState {
                operation: "reset",
                state: "uninitialized",
            }
        );

        problem.init(&scenario_graph()).unwrap();
        assert!(matches!(
            problem.init(&scenario_graph()),
            Err(SsspError::InvalidState { .. })
        ));
        let mut labels = vec![None; 5];
        assert!(matches!(
            problem.extract(&mut labels, None),
            Err(SsspError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let config = SsspConfig::default().with_queue_sizing(0.0);
        assert!(Problem::new(DeviceSet::single(), config).is_err());
        let empty = DeviceSet::new(0, DeviceMemoryLimits::default());
        assert!(Problem::new(empty, SsspConfig::default()).is_err());
    }

    #[test]
    fn test_reset_rejects_bad_source() {
        let mut problem = Problem::new(DeviceSet::single(), paths_config()).unwrap();
        problem.init(&scenario_graph()).unwrap();
        assert_eq!(
            problem.reset(NodeId(5), FrontierType::Mixed, 2.0),
            Err(SsspError::InvalidSource {
                vertex: 5,
                num_nodes: 5,
            })
        );
        assert!(matches!(
            problem.reset(NodeId(0), FrontierType::Mixed, 0.5),
            Err(SsspError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_reset_seeds_only_the_owner() {
        let devices = DeviceSet::new(2, DeviceMemoryLimits::default());
        let mut problem = Problem::new(devices, paths_config()).unwrap();
        problem.init(&scenario_graph()).unwrap();

        // Block partition: 0..3 on device 0, 3..5 on device 1
        problem.reset(NodeId(3), FrontierType::Vertex, 1.0).unwrap();

        let owner = problem.data_slice(DeviceId(1)).unwrap();
        assert_eq!(owner.frontier().to_vec().unwrap(), vec![0]);
        let other = problem.data_slice(DeviceId(0)).unwrap();
        assert!(other.frontier().is_empty());

        let snapshot = problem.labels_snapshot().unwrap();
        assert_eq!(snapshot, vec![None, None, None, Some(0.0), None]);
    }

    #[test]
    fn test_multi_device_registers_associates() {
        let devices = DeviceSet::new(2, DeviceMemoryLimits::default());
        let mut problem = Problem::new(devices, paths_config()).unwrap();
        problem.init(&scenario_graph()).unwrap();

        for id in [DeviceId(0), DeviceId(1)] {
            assert!(problem.associates().contains(id, AssociateKind::Labels));
            assert!(problem
                .associates()
                .contains(id, AssociateKind::Predecessors));
        }
    }

    #[test]
    fn test_repeated_reset_reuses_buffers() {
        let mut problem = Problem::new(DeviceSet::single(), paths_config()).unwrap();
        problem.init(&scenario_graph()).unwrap();
        problem.reset(NodeId(0), FrontierType::Mixed, 2.0).unwrap();
        let device = problem.devices().device(DeviceId(0)).unwrap().clone();
        let before = device.memory_stats();

        for source in [1, 2, 0] {
            problem
                .reset(NodeId(source), FrontierType::Mixed, 2.0)
                .unwrap();
        }
        assert_eq!(device.memory_stats(), before);
    }

    #[test]
    fn test_init_allocation_failure_propagates() {
        let devices = DeviceSet::new(1, DeviceMemoryLimits::new(40));
        let device = devices.device(DeviceId(0)).unwrap().clone();
        let mut problem = Problem::new(devices, SsspConfig::default()).unwrap();

        let err = problem.init(&scenario_graph()).unwrap_err();
        assert!(matches!(
            err,
            SsspError::Device(DeviceError::AllocationFailure { .. })
        ));
        assert_eq!(problem.state(), ProblemState::Uninitialized);

        // Partial allocations live until the problem goes away
        assert!(device.memory_stats().allocated_bytes > 0);
        drop(problem);
        assert_eq!(device.memory_stats().allocated_bytes, 0);
    }

    #[test]
    fn test_init_transfer_failure_propagates() {
        let devices = DeviceSet::single();
        devices.device(DeviceId(0)).unwrap().fail_transfers_after(0);
        let mut problem = Problem::new(devices, SsspConfig::default()).unwrap();

        let err = problem.init(&scenario_graph()).unwrap_err();
        assert!(matches!(
            err,
            SsspError::Device(DeviceError::TransferFailure {
                buffer: "weights",
                ..
            })
        ));
    }

    #[test]
    fn test_unavailable_device_fails_select() {
        let devices = DeviceSet::new(2, DeviceMemoryLimits::default());
        devices.device(DeviceId(1)).unwrap().set_available(false);
        let mut problem = Problem::new(devices, paths_config()).unwrap();

        let err = problem.init(&scenario_graph()).unwrap_err();
        assert!(matches!(
            err,
            SsspError::Device(DeviceError::DeviceSelectFailure { .. })
        ));
        // Device 0 was initialized before the failure
        assert_eq!(problem.data_slices().len(), 1);
    }

    #[test]
    fn test_extract_transfer_failure_propagates() {
        let mut problem = Problem::new(DeviceSet::single(), paths_config()).unwrap();
        problem.init(&scenario_graph()).unwrap();
        problem.reset(NodeId(0), FrontierType::Mixed, 2.0).unwrap();
        problem
            .devices()
            .device(DeviceId(0))
            .unwrap()
            .fail_transfers_after(0);

        let mut labels = vec![None; 5];
        let err = problem.extract(&mut labels, None).unwrap_err();
        assert!(matches!(
            err,
            SsspError::Device(DeviceError::TransferFailure { .. })
        ));
    }

    #[test]
    fn test_extract_checks_output_lengths() {
        let mut problem = Problem::new(DeviceSet::single(), paths_config()).unwrap();
        problem.init(&scenario_graph()).unwrap();
        problem.reset(NodeId(0), FrontierType::Mixed, 2.0).unwrap();

        let mut labels = vec![None; 3];
        assert_eq!(
            problem.extract(&mut labels, None),
            Err(SsspError::OutputLength {
                name: "labels",
                expected: 5,
                actual: 3,
            })
        );

        let mut labels = vec![None; 5];
        let mut preds = vec![None; 4];
        assert!(matches!(
            problem.extract(&mut labels, Some(&mut preds)),
            Err(SsspError::OutputLength { name: "preds", .. })
        ));
    }

    #[test]
    fn test_extract_preds_requires_paths() {
        let mut problem = Problem::new(DeviceSet::single(), SsspConfig::default()).unwrap();
        problem.init(&scenario_graph()).unwrap();
        problem.reset(NodeId(0), FrontierType::Mixed, 2.0).unwrap();

        let mut labels = vec![None; 5];
        let mut preds = vec![None; 5];
        assert!(matches!(
            problem.extract(&mut labels, Some(&mut preds)),
            Err(SsspError::InvalidConfig(_))
        ));
        assert!(problem.extract(&mut labels, None).is_ok());
    }

    fn converged_two_device(policy: GatherPolicy) -> Problem {
        let devices = DeviceSet::new(2, DeviceMemoryLimits::default());
        let config = paths_config().with_gather_policy(policy);
        let mut problem = Problem::new(devices, config).unwrap();
        problem.init(&scenario_graph()).unwrap();
        problem.reset(NodeId(0), FrontierType::Mixed, 2.0).unwrap();
        Enactor::new(&mut problem).unwrap().enact().unwrap();
        problem
    }

    #[test]
    fn test_best_effort_gather_skips_bad_entries() {
        let mut problem = converged_two_device(GatherPolicy::BestEffort);
        problem.table_mut().corrupt(4, 1, 99);
        problem.table_mut().corrupt(2, 7, 0);

        // Buffers reused from an earlier call
        let mut labels = vec![Some(99.0); 5];
        let mut preds = vec![Some(NodeId(9)); 5];
        let report = problem.extract(&mut labels, Some(&mut preds)).unwrap();

        assert_eq!(report.gathered, 3);
        assert!(!report.is_complete());
        assert_eq!(
            report.skipped,
            vec![
                SsspError::IndexOutOfRange {
                    vertex: 2,
                    device: 7,
                    local: 0,
                },
                SsspError::IndexOutOfRange {
                    vertex: 4,
                    device: 1,
                    local: 99,
                },
            ]
        );
        assert_eq!(labels, vec![Some(0.0), Some(2.0), None, Some(4.0), None]);
        assert_eq!(
            preds,
            vec![None, Some(NodeId(0)), None, Some(NodeId(2)), None]
        );
    }

    #[test]
    fn test_best_effort_gather_reports_missing_entries() {
        let mut problem = converged_two_device(GatherPolicy::BestEffort);
        problem.table_mut().truncate(4);

        let mut labels = vec![Some(99.0); 5];
        let mut preds = vec![Some(NodeId(9)); 5];
        let report = problem.extract(&mut labels, Some(&mut preds)).unwrap();

        assert_eq!(report.gathered, 4);
        assert_eq!(
            report.skipped,
            vec![SsspError::IndexOutOfRange {
                vertex: 4,
                device: u32::MAX,
                local: u32::MAX,
            }]
        );
        assert_eq!(labels[4], None);
        assert_eq!(preds[4], None);
        assert_eq!(labels[3], Some(4.0));
    }

    #[test]
    fn test_strict_gather_fails_on_missing_entry() {
        let mut problem = converged_two_device(GatherPolicy::Strict);
        problem.table_mut().truncate(4);

        let mut labels = vec![None; 5];
        assert_eq!(
            problem.extract(&mut labels, None),
            Err(SsspError::IndexOutOfRange {
                vertex: 4,
                device: u32::MAX,
                local: u32::MAX,
            })
        );
    }

    #[test]
    fn test_failed_reset_falls_back_to_initialized() {
        let devices = DeviceSet::new(2, DeviceMemoryLimits::default());
        let mut problem = Problem::new(devices, paths_config()).unwrap();
        problem.init(&scenario_graph()).unwrap();
        problem.reset(NodeId(0), FrontierType::Mixed, 2.0).unwrap();
        assert_eq!(problem.state(), ProblemState::Ready);

        // Device 0 resets, device 1 cannot be selected
        let second = problem.devices().device(DeviceId(1)).unwrap().clone();
        second.set_available(false);
        let err = problem
            .reset(NodeId(3), FrontierType::Mixed, 2.0)
            .unwrap_err();
        assert!(matches!(
            err,
            SsspError::Device(DeviceError::DeviceSelectFailure { .. })
        ));
        assert_eq!(problem.state(), ProblemState::Initialized);
        assert_eq!(problem.source(), None);
        assert!(matches!(
            Enactor::new(&mut problem),
            Err(SsspError::InvalidState { .. })
        ));
        let mut labels = vec![None; 5];
        assert!(matches!(
            problem.extract(&mut labels, None),
            Err(SsspError::InvalidState { .. })
        ));

        second.set_available(true);
        problem.reset(NodeId(3), FrontierType::Mixed, 2.0).unwrap();
        assert_eq!(problem.state(), ProblemState::Ready);
    }

    #[test]
    fn test_strict_gather_fails_on_bad_entry() {
        let mut problem = converged_two_device(GatherPolicy::Strict);
        problem.table_mut().corrupt(4, 1, 99);

        let mut labels = vec![None; 5];
        assert_eq!(
            problem.extract(&mut labels, None),
            Err(SsspError::IndexOutOfRange {
                vertex: 4,
                device: 1,
                local: 99,
            })
        );
    }

    #[test]
    fn test_extract_leaves_host_copies() {
        let mut problem = converged_two_device(GatherPolicy::BestEffort);
        problem.extract_result().unwrap();
        for slice in problem.data_slices() {
            assert!(slice.labels().is_allocated(Location::Host));
        }
    }
}
