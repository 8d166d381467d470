//! Grafo de dependencias entre steps de un pattern.
//!
//! Nodo = step (identificado por su clave `as`). Arista `u -> v` cuando `v`
//! referencia (en args o en su condición) la clave producida por `u`. Las
//! referencias a inputs del llamador o a `$ctx` no generan aristas.

use std::collections::{BTreeSet, HashMap};

use super::{scan_references, PatternSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    producers: HashMap<String, usize>,
    arg_keys: Vec<Vec<String>>,
    condition_keys: Vec<Vec<String>>,
    upstream: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    /// Construye el grafo. Las referencias mal formadas se ignoran (las
    /// reporta el validador).
    pub fn build(spec: &PatternSpec) -> Self {
        let nodes: Vec<String> = spec.steps.iter().map(|s| s.output_key.clone()).collect();
        let mut producers = HashMap::new();
        for (idx, key) in nodes.iter().enumerate() {
            producers.entry(key.clone()).or_insert(idx);
        }

        let mut arg_keys = Vec::with_capacity(nodes.len());
        let mut condition_keys = Vec::with_capacity(nodes.len());
        let mut upstream = Vec::with_capacity(nodes.len());
        for step in &spec.steps {
            let mut args = Vec::new();
            for value in step.args.values() {
                for reference in scan_references(value).into_iter().flatten() {
                    if let Some(key) = reference.state_key() {
                        push_unique(&mut args, key);
                    }
                }
            }
            let mut conds = Vec::new();
            if let Some(condition) = &step.condition {
                for reference in condition.references().into_iter().flatten() {
                    if let Some(key) = reference.state_key() {
                        push_unique(&mut conds, key);
                    }
                }
            }
            let deps: BTreeSet<usize> = args.iter().chain(conds.iter()).filter_map(|k| producers.get(k).copied()).collect();
            arg_keys.push(args);
            condition_keys.push(conds);
            upstream.push(deps);
        }

        Self { nodes,
               producers,
               arg_keys,
               condition_keys,
               upstream }
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Índice del step que produce `key`.
    pub fn producer(&self, key: &str) -> Option<usize> {
        self.producers.get(key).copied()
    }

    /// Claves de estado referenciadas por los args del step `idx`.
    pub fn arg_keys(&self, idx: usize) -> &[String] {
        &self.arg_keys[idx]
    }

    /// Claves de estado referenciadas por la condición del step `idx`.
    pub fn condition_keys(&self, idx: usize) -> &[String] {
        &self.condition_keys[idx]
    }

    pub fn upstream(&self, idx: usize) -> &BTreeSet<usize> {
        &self.upstream[idx]
    }

    /// Componentes fuertemente conexas con ciclo (Tarjan). Cada ciclo se
    /// devuelve como lista de claves `as` en orden de declaración.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let mut tarjan = Tarjan { graph: self,
                                  index: 0,
                                  indices: vec![None; self.len()],
                                  lowlink: vec![0; self.len()],
                                  on_stack: vec![false; self.len()],
                                  stack: Vec::new(),
                                  components: Vec::new() };
        for v in 0..self.len() {
            if tarjan.indices[v].is_none() {
                tarjan.connect(v);
            }
        }
        let mut cycles: Vec<Vec<usize>> = tarjan.components
                                                .into_iter()
                                                .filter(|c| c.len() > 1 || self.upstream[c[0]].contains(&c[0]))
                                                .map(|mut c| {
                                                    c.sort_unstable();
                                                    c
                                                })
                                                .collect();
        cycles.sort();
        cycles.into_iter().map(|c| c.into_iter().map(|i| self.nodes[i].clone()).collect()).collect()
    }

    /// Orden topológico estable (Kahn, desempate por declaración). `None` si
    /// hay ciclos.
    pub fn topological_order(&self) -> Option<Vec<usize>> {
        let mut remaining: Vec<usize> = self.upstream.iter().map(BTreeSet::len).collect();
        let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); self.len()];
        for (v, deps) in self.upstream.iter().enumerate() {
            for &u in deps {
                downstream[u].push(v);
            }
        }
        let mut ready: BTreeSet<usize> = (0..self.len()).filter(|&v| remaining[v] == 0).collect();
        let mut order = Vec::with_capacity(self.len());
        while let Some(v) = ready.pop_first() {
            order.push(v);
            for &w in &downstream[v] {
                remaining[w] -= 1;
                if remaining[w] == 0 {
                    ready.insert(w);
                }
            }
        }
        (order.len() == self.len()).then_some(order)
    }
}

fn push_unique(keys: &mut Vec<String>, key: &str) {
    if !keys.iter().any(|k| k == key) {
        keys.push(key.to_string());
    }
}

struct Tarjan<'a> {
    graph: &'a DependencyGraph,
    index: usize,
    indices: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    components: Vec<Vec<usize>>,
}

impl Tarjan<'_> {
    fn connect(&mut self, v: usize) {
        self.indices[v] = Some(self.index);
        self.lowlink[v] = self.index;
        self.index += 1;
        self.stack.push(v);
        self.on_stack[v] = true;

        let graph = self.graph;
        for &w in graph.upstream(v) {
            match self.indices[w] {
                None => {
                    self.connect(w);
                    self.lowlink[v] = self.lowlink[v].min(self.lowlink[w]);
                }
                Some(w_index) if self.on_stack[w] => {
                    self.lowlink[v] = self.lowlink[v].min(w_index);
                }
                Some(_) => {}
            }
        }

        if Some(self.lowlink[v]) == self.indices[v] {
            let mut component = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{Condition, StepSpec};
    use serde_json::json;

    fn two_step() -> PatternSpec {
        PatternSpec::new("two_step").input("seed")
                                    .step(StepSpec::new("a.fetch", "x").arg("value", json!("$seed")))
                                    .step(StepSpec::new("b.double", "y").arg("value", json!("$x")))
                                    .output("y")
    }

    #[test]
    fn edges_follow_references_not_inputs() {
        let g = DependencyGraph::build(&two_step());
        assert_eq!(g.nodes(), &["x".to_string(), "y".to_string()]);
        assert!(g.upstream(0).is_empty());
        assert_eq!(g.upstream(1).iter().copied().collect::<Vec<_>>(), vec![0]);
        assert_eq!(g.arg_keys(0), &["seed".to_string()]);
        assert_eq!(g.producer("y"), Some(1));
        assert_eq!(g.producer("seed"), None);
        assert_eq!(g.topological_order(), Some(vec![0, 1]));
        assert!(g.find_cycles().is_empty());
    }

    #[test]
    fn detects_two_node_cycle_and_self_loop() {
        let spec = PatternSpec::new("cyclic").step(StepSpec::new("a.f", "a").arg("v", json!("$b")))
                                             .step(StepSpec::new("b.f", "b").arg("v", json!(["$a.items.0"])))
                                             .step(StepSpec::new("c.f", "c").arg("v", json!("$c")))
                                             .step(StepSpec::new("d.f", "d").arg("v", json!("$a")));
        let g = DependencyGraph::build(&spec);
        assert_eq!(g.find_cycles(), vec![vec!["a".to_string(), "b".to_string()], vec!["c".to_string()]]);
        assert_eq!(g.topological_order(), None);
    }

    #[test]
    fn condition_references_are_edges() {
        let spec = PatternSpec::new("cond").step(StepSpec::new("s.stress", "stress").when(Condition::exists("$regime")))
                                           .step(StepSpec::new("m.regime", "regime"));
        let g = DependencyGraph::build(&spec);
        assert_eq!(g.condition_keys(0), &["regime".to_string()]);
        assert!(g.arg_keys(0).is_empty());
        assert_eq!(g.topological_order(), Some(vec![1, 0]));
    }
}
