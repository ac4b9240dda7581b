//! Component graph: descriptors, validation and instantiation order

use crate::error::GraphError;
use petgraph::algo::{kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Identity of a component in the deployment
///
/// The declaration order is the tie-break used inside a topological layer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ComponentId {
    Edge,
    Network,
    Identity,
    Cache,
    Database,
    Compute,
}

impl ComponentId {
    pub const ALL: [ComponentId; 6] = [
        ComponentId::Edge,
        ComponentId::Network,
        ComponentId::Identity,
        ComponentId::Cache,
        ComponentId::Database,
        ComponentId::Compute,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComponentId::Edge => "edge",
            ComponentId::Network => "network",
            ComponentId::Identity => "identity",
            ComponentId::Cache => "cache",
            ComponentId::Database => "database",
            ComponentId::Compute => "compute",
        }
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed reference to one output of another component
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct OutputRef {
    pub component: ComponentId,
    pub output: &'static str,
}

impl OutputRef {
    pub const fn new(component: ComponentId, output: &'static str) -> Self {
        Self { component, output }
    }
}

impl std::fmt::Display for OutputRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.component, self.output)
    }
}

/// Declared inputs and outputs of a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    pub name: ComponentId,
    pub inputs: Vec<OutputRef>,
    pub outputs: Vec<&'static str>,
}

impl ComponentDescriptor {
    pub fn new(name: ComponentId) -> Self {
        Self {
            name,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn input(mut self, component: ComponentId, output: &'static str) -> Self {
        self.inputs.push(OutputRef::new(component, output));
        self
    }

    pub fn output(mut self, output: &'static str) -> Self {
        self.outputs.push(output);
        self
    }

    /// Components this one reads from
    pub fn dependencies(&self) -> BTreeSet<ComponentId> {
        self.inputs.iter().map(|r| r.component).collect()
    }

    pub fn declares_input_from(&self, producer: ComponentId) -> bool {
        self.inputs.iter().any(|r| r.component == producer)
    }

    pub fn produces(&self, output: &str) -> bool {
        self.outputs.contains(&output)
    }
}

/// Validated instantiation order
///
/// Components in the same layer never reference each other and may be
/// submitted concurrently. Every component sits in a later layer than all
/// components it references.
#[derive(Debug, Clone)]
pub struct CompositionPlan {
    descriptors: BTreeMap<ComponentId, ComponentDescriptor>,
    layers: Vec<Vec<ComponentId>>,
}

impl CompositionPlan {
    /// Order components topologically into layers
    pub fn build(descriptors: Vec<ComponentDescriptor>) -> Result<Self, GraphError> {
        let descriptors = index_descriptors(descriptors)?;
        validate_references(&descriptors)?;
        let (graph, nodes) = dependency_graph(&descriptors);

        let sorted = toposort(&graph, None)
            .map_err(|cycle| GraphError::DependencyCycle {
                path: cycle_path(&graph, cycle.node_id()),
            })?;

        let mut depth: HashMap<ComponentId, usize> = HashMap::new();
        for node in sorted {
            let id = graph[node];
            let layer = descriptors[&id]
                .dependencies()
                .iter()
                .map(|dep| depth[dep] + 1)
                .max()
                .unwrap_or(0);
            depth.insert(id, layer);
        }
        debug_assert_eq!(depth.len(), nodes.len());

        let layer_count = depth.values().max().map_or(0, |d| d + 1);
        let mut layers = vec![Vec::new(); layer_count];
        for (id, layer) in depth {
            layers[layer].push(id);
        }
        for layer in &mut layers {
            layer.sort();
        }

        Ok(Self {
            descriptors,
            layers,
        })
    }

    /// Use an operator-fixed order, one component per layer
    ///
    /// Fails if any component would read an output that has not been
    /// produced by an earlier component in `order`.
    pub fn sequenced(
        descriptors: Vec<ComponentDescriptor>,
        order: &[ComponentId],
    ) -> Result<Self, GraphError> {
        let descriptors = index_descriptors(descriptors)?;
        validate_references(&descriptors)?;

        let listed: BTreeSet<ComponentId> = order.iter().copied().collect();
        let declared: BTreeSet<ComponentId> = descriptors.keys().copied().collect();
        if listed.len() != order.len() || listed != declared {
            return Err(GraphError::SequenceMismatch(format!(
                "order lists [{}], components are [{}]",
                join(order.iter()),
                join(declared.iter())
            )));
        }

        let (graph, _) = dependency_graph(&descriptors);
        if let Err(cycle) = toposort(&graph, None) {
            return Err(GraphError::DependencyCycle {
                path: cycle_path(&graph, cycle.node_id()),
            });
        }

        let mut produced = BTreeSet::new();
        for id in order {
            for reference in &descriptors[id].inputs {
                if !produced.contains(&reference.component) {
                    return Err(GraphError::UnresolvedReference {
                        component: *id,
                        producer: reference.component,
                        output: reference.output,
                    });
                }
            }
            produced.insert(*id);
        }

        Ok(Self {
            descriptors,
            layers: order.iter().map(|id| vec![*id]).collect(),
        })
    }

    pub fn layers(&self) -> &[Vec<ComponentId>] {
        &self.layers
    }

    /// Flattened instantiation order
    pub fn order(&self) -> Vec<ComponentId> {
        self.layers.iter().flatten().copied().collect()
    }

    pub fn descriptor(&self, id: ComponentId) -> Option<&ComponentDescriptor> {
        self.descriptors.get(&id)
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.descriptors.contains_key(&id)
    }

    /// Check that some component declares each of `references` as an output
    pub fn require_outputs(&self, references: &[OutputRef]) -> Result<(), GraphError> {
        for reference in references {
            let produced = self
                .descriptors
                .get(&reference.component)
                .is_some_and(|d| d.produces(reference.output));
            if !produced {
                return Err(GraphError::MissingDeploymentOutput(*reference));
            }
        }
        Ok(())
    }
}

fn index_descriptors(
    descriptors: Vec<ComponentDescriptor>,
) -> Result<BTreeMap<ComponentId, ComponentDescriptor>, GraphError> {
    let mut index = BTreeMap::new();
    for descriptor in descriptors {
        let name = descriptor.name;
        if index.insert(name, descriptor).is_some() {
            return Err(GraphError::DuplicateComponent(name));
        }
    }
    Ok(index)
}

fn validate_references(
    descriptors: &BTreeMap<ComponentId, ComponentDescriptor>,
) -> Result<(), GraphError> {
    for descriptor in descriptors.values() {
        for reference in &descriptor.inputs {
            let known = descriptors
                .get(&reference.component)
                .is_some_and(|producer| producer.produces(reference.output));
            if !known {
                return Err(GraphError::UnknownOutput {
                    component: descriptor.name,
                    reference: *reference,
                });
            }
        }
    }
    Ok(())
}

/// Edges point from producer to consumer
fn dependency_graph(
    descriptors: &BTreeMap<ComponentId, ComponentDescriptor>,
) -> (DiGraph<ComponentId, ()>, HashMap<ComponentId, NodeIndex>) {
    let mut graph = DiGraph::new();
    let nodes: HashMap<ComponentId, NodeIndex> = descriptors
        .keys()
        .map(|id| (*id, graph.add_node(*id)))
        .collect();

    for descriptor in descriptors.values() {
        for producer in descriptor.dependencies() {
            graph.update_edge(nodes[&producer], nodes[&descriptor.name], ());
        }
    }

    (graph, nodes)
}

/// Walk the strongly connected component containing `start` until a node
/// repeats, and return that loop
fn cycle_path(graph: &DiGraph<ComponentId, ()>, start: NodeIndex) -> Vec<ComponentId> {
    let members: HashSet<NodeIndex> = kosaraju_scc(graph)
        .into_iter()
        .find(|scc| scc.contains(&start))
        .unwrap_or_default()
        .into_iter()
        .collect();

    let mut path = vec![start];
    let mut current = start;
    loop {
        let next = graph
            .neighbors(current)
            .filter(|n| members.contains(n))
            .min_by_key(|n| graph[*n]);
        let Some(next) = next else {
            break;
        };
        if let Some(pos) = path.iter().position(|n| *n == next) {
            let mut cycle: Vec<ComponentId> = path[pos..].iter().map(|n| graph[*n]).collect();
            cycle.push(graph[next]);
            return cycle;
        }
        path.push(next);
        current = next;
    }

    path.into_iter().map(|n| graph[n]).collect()
}

fn join<'a>(ids: impl Iterator<Item = &'a ComponentId>) -> String {
    ids.map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ComponentId::*;

    fn standard() -> Vec<ComponentDescriptor> {
        vec![
            ComponentDescriptor::new(Edge).output("domain"),
            ComponentDescriptor::new(Network).output("vpc").output("groups"),
            ComponentDescriptor::new(Identity).output("pool_id").output("authorizer"),
            ComponentDescriptor::new(Cache)
                .input(Network, "vpc")
                .input(Network, "groups")
                .output("endpoint"),
            ComponentDescriptor::new(Database)
                .input(Network, "vpc")
                .output("endpoint")
                .output("secret"),
            ComponentDescriptor::new(Compute)
                .input(Network, "vpc")
                .input(Cache, "endpoint")
                .input(Database, "endpoint")
                .input(Database, "secret")
                .input(Identity, "authorizer")
                .input(Edge, "domain")
                .output("service_url"),
        ]
    }

    #[test]
    fn test_layers_follow_dependencies() {
        let plan = CompositionPlan::build(standard()).unwrap();
        assert_eq!(
            plan.layers(),
            &[
                vec![Edge, Network, Identity],
                vec![Cache, Database],
                vec![Compute]
            ]
        );
    }

    #[test]
    fn test_every_component_after_its_dependencies() {
        // Declaration order must not matter.
        let mut descriptors = standard();
        descriptors.reverse();
        let plan = CompositionPlan::build(descriptors).unwrap();
        let order = plan.order();

        for id in &order {
            let position = order.iter().position(|c| c == id).unwrap();
            for dep in plan.descriptor(*id).unwrap().dependencies() {
                let dep_position = order.iter().position(|c| *c == dep).unwrap();
                assert!(dep_position < position, "{dep} must precede {id}");
            }
        }
    }

    #[test]
    fn test_cycle_is_rejected() {
        let descriptors = vec![
            ComponentDescriptor::new(Network)
                .input(Compute, "service_url")
                .output("vpc"),
            ComponentDescriptor::new(Compute)
                .input(Network, "vpc")
                .output("service_url"),
        ];

        match CompositionPlan::build(descriptors) {
            Err(GraphError::DependencyCycle { path }) => {
                assert_eq!(path.first(), path.last());
                assert!(path.contains(&Network));
                assert!(path.contains(&Compute));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let descriptors = vec![ComponentDescriptor::new(Cache)
            .input(Cache, "endpoint")
            .output("endpoint")];

        assert!(matches!(
            CompositionPlan::build(descriptors),
            Err(GraphError::DependencyCycle { path }) if path == vec![Cache, Cache]
        ));
    }

    #[test]
    fn test_unknown_output_is_rejected() {
        let descriptors = vec![
            ComponentDescriptor::new(Network).output("vpc"),
            ComponentDescriptor::new(Cache)
                .input(Network, "subnets")
                .output("endpoint"),
        ];

        assert!(matches!(
            CompositionPlan::build(descriptors),
            Err(GraphError::UnknownOutput { component: Cache, .. })
        ));
    }

    #[test]
    fn test_duplicate_component_is_rejected() {
        let descriptors = vec![
            ComponentDescriptor::new(Network).output("vpc"),
            ComponentDescriptor::new(Network).output("vpc"),
        ];

        assert_eq!(
            CompositionPlan::build(descriptors).unwrap_err(),
            GraphError::DuplicateComponent(Network)
        );
    }

    #[test]
    fn test_sequenced_order_violating_an_edge() {
        let order = [Edge, Network, Cache, Database, Compute, Identity];

        assert_eq!(
            CompositionPlan::sequenced(standard(), &order).unwrap_err(),
            GraphError::UnresolvedReference {
                component: Compute,
                producer: Identity,
                output: "authorizer",
            }
        );
    }

    #[test]
    fn test_sequenced_valid_order() {
        let order = [Edge, Network, Cache, Database, Identity, Compute];
        let plan = CompositionPlan::sequenced(standard(), &order).unwrap();

        assert_eq!(plan.order(), order.to_vec());
        assert!(plan.layers().iter().all(|layer| layer.len() == 1));
    }

    #[test]
    fn test_sequenced_must_list_every_component() {
        let order = [Edge, Network, Cache, Database, Compute];
        assert!(matches!(
            CompositionPlan::sequenced(standard(), &order),
            Err(GraphError::SequenceMismatch(_))
        ));
    }

    #[test]
    fn test_require_outputs() {
        let plan = CompositionPlan::build(standard()).unwrap();
        assert!(
            plan.require_outputs(&[OutputRef::new(Edge, "domain")])
                .is_ok()
        );
        assert_eq!(
            plan.require_outputs(&[OutputRef::new(Identity, "client_id")]),
            Err(GraphError::MissingDeploymentOutput(OutputRef::new(
                Identity,
                "client_id"
            )))
        );
    }

    mod generated {
        use super::*;
        use proptest::prelude::*;

        /// Descriptors for the DAG where `ranked[j]` reads from `ranked[i]`
        /// for every `i < j` whose pair bit is set in `mask`
        fn forward_descriptors(ranked: &[ComponentId], mask: u16) -> Vec<ComponentDescriptor> {
            let mut bit = 0;
            let mut descriptors: Vec<_> = ranked
                .iter()
                .map(|id| ComponentDescriptor::new(*id).output("out"))
                .collect();
            for j in 0..ranked.len() {
                for i in 0..j {
                    if mask & (1 << bit) != 0 {
                        descriptors[j] = descriptors[j].clone().input(ranked[i], "out");
                    }
                    bit += 1;
                }
            }
            descriptors
        }

        fn layer_of(plan: &CompositionPlan, id: ComponentId) -> usize {
            plan.layers()
                .iter()
                .position(|layer| layer.contains(&id))
                .unwrap()
        }

        proptest! {
            #[test]
            fn test_generated_dag_layers_respect_dependencies(
                ranked in Just(ComponentId::ALL.to_vec()).prop_shuffle(),
                mask in 0u16..(1 << 15),
                declared in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle(),
            ) {
                let descriptors = forward_descriptors(&ranked, mask);
                let descriptors: Vec<_> = declared.iter().map(|i| descriptors[*i].clone()).collect();
                let plan = CompositionPlan::build(descriptors).unwrap();

                prop_assert_eq!(plan.order().len(), ComponentId::ALL.len());
                for id in ComponentId::ALL {
                    let descriptor = plan.descriptor(id).unwrap();
                    for dep in descriptor.dependencies() {
                        prop_assert!(layer_of(&plan, dep) < layer_of(&plan, id));
                    }
                }
                for layer in plan.layers() {
                    prop_assert!(!layer.is_empty());
                    for a in layer {
                        for b in layer {
                            prop_assert!(!plan.descriptor(*a).unwrap().declares_input_from(*b));
                        }
                    }
                }
            }

            #[test]
            fn test_generated_back_edge_is_a_cycle(
                ranked in Just(ComponentId::ALL.to_vec()).prop_shuffle(),
                mask in 0u16..(1 << 15),
                pair in (0..6usize, 0..6usize).prop_filter("distinct", |(a, b)| a != b),
            ) {
                let (early, late) = (pair.0.min(pair.1), pair.0.max(pair.1));
                let mut descriptors = forward_descriptors(&ranked, mask);
                if !descriptors[late].declares_input_from(ranked[early]) {
                    descriptors[late] = descriptors[late].clone().input(ranked[early], "out");
                }
                descriptors[early] = descriptors[early].clone().input(ranked[late], "out");
                let declared = descriptors.clone();

                match CompositionPlan::build(descriptors) {
                    Err(GraphError::DependencyCycle { path }) => {
                        prop_assert!(path.len() >= 2);
                        prop_assert_eq!(path.first(), path.last());
                        for step in path.windows(2) {
                            let (producer, consumer) = (step[0], step[1]);
                            let reads = declared
                                .iter()
                                .find(|d| d.name == consumer)
                                .is_some_and(|d| d.declares_input_from(producer));
                            prop_assert!(reads, "{} does not read from {}", consumer, producer);
                        }
                    }
                    other => prop_assert!(false, "expected cycle, got {:?}", other),
                }
            }
        }
    }
}
