use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use url::Url;

/// Find the files that lie on a cycle of `edges`.
///
/// Maps every such file to the shortest cycle through it, listed from that
/// file and without repeating it at the end. A file that imports itself maps
/// to a single-element cycle.
pub fn find_cycles<'a>(
    edges: impl IntoIterator<Item = (&'a Url, &'a Url)>,
) -> BTreeMap<Url, Vec<Url>> {
    let mut graph: DiGraph<Url, ()> = DiGraph::new();
    let mut nodes: HashMap<Url, NodeIndex> = HashMap::new();
    let mut node = |graph: &mut DiGraph<Url, ()>, uri: &Url| {
        *nodes
            .entry(uri.clone())
            .or_insert_with(|| graph.add_node(uri.clone()))
    };
    for (from, to) in edges {
        let a = node(&mut graph, from);
        let b = node(&mut graph, to);
        graph.update_edge(a, b, ());
    }

    let mut cycles = BTreeMap::new();
    for component in tarjan_scc(&graph) {
        let on_cycle = component.len() > 1 || graph.contains_edge(component[0], component[0]);
        if !on_cycle {
            continue;
        }
        let members: HashSet<NodeIndex> = component.iter().copied().collect();
        for &start in &component {
            let cycle = shortest_cycle(&graph, start, &members)
                .into_iter()
                .map(|n| graph[n].clone())
                .collect();
            cycles.insert(graph[start].clone(), cycle);
        }
    }
    cycles
}

/// Breadth-first search from `start` back to itself, staying inside
/// `members`. Neighbours are explored in URI order.
fn shortest_cycle(
    graph: &DiGraph<Url, ()>,
    start: NodeIndex,
    members: &HashSet<NodeIndex>,
) -> Vec<NodeIndex> {
    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        let mut next: Vec<NodeIndex> = graph
            .neighbors(current)
            .filter(|n| members.contains(n))
            .collect();
        next.sort_by(|a, b| graph[*a].cmp(&graph[*b]));
        for n in next {
            if n == start {
                let mut path = vec![current];
                let mut cursor = current;
                while cursor != start {
                    match parent.get(&cursor) {
                        Some(&p) => cursor = p,
                        None => break,
                    }
                    path.push(cursor);
                }
                path.reverse();
                return path;
            }
            if !parent.contains_key(&n) {
                parent.insert(n, current);
                queue.push_back(n);
            }
        }
    }
    vec![start]
}
