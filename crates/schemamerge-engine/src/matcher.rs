//! Vertex matching across two schema graphs
//!
//! Vertices are paired by equivalence key first. With experimental matching
//! enabled, vertices left over from the key pass are paired by content hash
//! (pure renames) and then by a weighted similarity score. Later passes only
//! see vertices that earlier passes left unmatched.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use schemamerge_core::naming::fold_identifier;
use schemamerge_core::{DetectionError, EquivalenceKey, MatcherConfig, SchemaObject, VertexId};
use schemamerge_graph::SchemaGraph;

/// Outcome of matching graph A against graph B
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    /// `(id in A, id in B)`, sorted by the A id
    pub pairs: Vec<(VertexId, VertexId)>,

    /// Vertices of A without a partner, sorted
    pub unique_a: Vec<VertexId>,

    /// Vertices of B without a partner, sorted
    pub unique_b: Vec<VertexId>,
}

impl MatchResult {
    /// A id -> B id
    pub fn forward(&self) -> HashMap<VertexId, VertexId> {
        self.pairs.iter().copied().collect()
    }

    /// B id -> A id
    pub fn backward(&self) -> HashMap<VertexId, VertexId> {
        self.pairs.iter().map(|&(a, b)| (b, a)).collect()
    }
}

/// Pairs "the same" schema object across two graphs
#[derive(Debug, Clone, Default)]
pub struct VertexMatcher {
    config: MatcherConfig,
}

impl VertexMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Match every vertex of `a` against `b`
    ///
    /// In strict mode an equivalence key held by two vertices of the same
    /// graph is a `VertexMatching` error. Otherwise duplicates are paired
    /// positionally in id order.
    pub fn match_graphs(&self, a: &SchemaGraph, b: &SchemaGraph) -> Result<MatchResult, DetectionError> {
        let pairs = self.match_by_key(a, b)?;
        let mut result = partition(a, b, pairs);

        if self.config.enable_experimental_matching {
            let by_hash = content_hash_pairs(a, b, &result.unique_a, &result.unique_b);
            let mut pairs = result.pairs;
            pairs.extend(by_hash);
            result = partition(a, b, pairs);

            let by_similarity = self.similarity_pairs(a, b, &result.unique_a, &result.unique_b);
            let mut pairs = result.pairs;
            pairs.extend(by_similarity);
            result = partition(a, b, pairs);
        }

        Ok(result)
    }

    /// Pair vertices that share an equivalence key
    pub fn match_by_key(&self, a: &SchemaGraph, b: &SchemaGraph) -> Result<Vec<(VertexId, VertexId)>, DetectionError> {
        let keyed_a = group_by_key(a);
        let keyed_b = group_by_key(b);

        if self.config.strict_keys {
            ensure_unique(&keyed_a, a.name())?;
            ensure_unique(&keyed_b, b.name())?;
        }

        let mut pairs = Vec::new();
        for (key, ids_a) in &keyed_a {
            if let Some(ids_b) = keyed_b.get(key) {
                pairs.extend(ids_a.iter().copied().zip(ids_b.iter().copied()));
            }
        }

        Ok(pairs)
    }

    /// Pair vertices whose content hash is unique on both sides
    ///
    /// Only available with experimental matching enabled.
    pub fn match_by_content_hash(
        &self,
        a: &SchemaGraph,
        b: &SchemaGraph,
    ) -> Result<Vec<(VertexId, VertexId)>, DetectionError> {
        if !self.config.enable_experimental_matching {
            return Err(DetectionError::Configuration {
                message: "content hash matching requires matcher.enable_experimental_matching".to_string(),
            });
        }

        let ids_a: Vec<VertexId> = a.vertices().map(|v| v.id).collect();
        let ids_b: Vec<VertexId> = b.vertices().map(|v| v.id).collect();
        Ok(content_hash_pairs(a, b, &ids_a, &ids_b))
    }

    /// Weighted similarity of two objects in [0, 1]
    ///
    /// Objects of different types never match.
    pub fn vertex_similarity(&self, x: &SchemaObject, y: &SchemaObject) -> f64 {
        if x.object_type() != y.object_type() {
            return 0.0;
        }

        let weights = &self.config.similarity_weights;
        let total = weights.name + weights.attributes;
        if total <= 0.0 {
            return 0.0;
        }

        let name = name_similarity(&fold_identifier(&x.name), &fold_identifier(&y.name));
        let attrs = attribute_similarity(&x.attributes(), &y.attributes());
        (weights.name * name + weights.attributes * attrs) / total
    }

    /// Greedy best-partner pairing among leftover vertices of the same type
    fn similarity_pairs(
        &self,
        a: &SchemaGraph,
        b: &SchemaGraph,
        candidates_a: &[VertexId],
        candidates_b: &[VertexId],
    ) -> Vec<(VertexId, VertexId)> {
        let mut taken: BTreeSet<VertexId> = BTreeSet::new();
        let mut pairs = Vec::new();

        for x in candidates_a.iter().filter_map(|&id| a.vertex(id)) {
            let mut best: Option<(VertexId, f64)> = None;

            for y in candidates_b.iter().filter_map(|&id| b.vertex(id)) {
                if taken.contains(&y.id) || x.object_type() != y.object_type() {
                    continue;
                }

                let score = self.vertex_similarity(x, y);
                if score >= self.config.similarity_threshold && best.map_or(true, |(_, s)| score > s) {
                    best = Some((y.id, score));
                }
            }

            if let Some((partner, _)) = best {
                taken.insert(partner);
                pairs.push((x.id, partner));
            }
        }

        pairs
    }
}

/// SHA-256 over object type, schema and attributes (not the name)
pub fn content_hash(object: &SchemaObject) -> String {
    let attributes = serde_json::to_string(&object.attributes()).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(object.object_type().as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(fold_identifier(&object.schema).as_bytes());
    hasher.update(b"|");
    hasher.update(attributes.as_bytes());
    hex::encode(hasher.finalize())
}

/// Ratcliff/Obershelp ratio: `2 * matching characters / total length`
pub fn name_similarity(x: &str, y: &str) -> f64 {
    let x: Vec<char> = x.chars().collect();
    let y: Vec<char> = y.chars().collect();

    let total = x.len() + y.len();
    if total == 0 {
        return 1.0;
    }

    2.0 * matching_characters(&x, &y) as f64 / total as f64
}

/// Share of attribute keys (over the union) whose values agree
///
/// Equal values count 1, two differing strings count their name similarity.
pub fn attribute_similarity(x: &BTreeMap<String, Value>, y: &BTreeMap<String, Value>) -> f64 {
    match (x.is_empty(), y.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }

    let keys: BTreeSet<&String> = x.keys().chain(y.keys()).collect();
    let score: f64 = keys
        .iter()
        .filter_map(|key| Some((x.get(*key)?, y.get(*key)?)))
        .map(|pair| match pair {
            (vx, vy) if vx == vy => 1.0,
            (Value::String(sx), Value::String(sy)) => name_similarity(sx, sy),
            _ => 0.0,
        })
        .sum();

    score / keys.len() as f64
}

fn matching_characters(x: &[char], y: &[char]) -> usize {
    let (i, j, len) = longest_common_block(x, y);
    if len == 0 {
        return 0;
    }

    len + matching_characters(&x[..i], &y[..j]) + matching_characters(&x[i + len..], &y[j + len..])
}

/// Longest common substring as `(start in x, start in y, length)`, earliest first
fn longest_common_block(x: &[char], y: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut previous = vec![0usize; y.len() + 1];

    for (i, cx) in x.iter().enumerate() {
        let mut current = vec![0usize; y.len() + 1];
        for (j, cy) in y.iter().enumerate() {
            if cx == cy {
                let len = previous[j] + 1;
                current[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        previous = current;
    }

    best
}

fn group_by_key(graph: &SchemaGraph) -> BTreeMap<EquivalenceKey, Vec<VertexId>> {
    let mut keyed: BTreeMap<EquivalenceKey, Vec<VertexId>> = BTreeMap::new();
    for vertex in graph.vertices() {
        keyed.entry(vertex.equivalence_key()).or_default().push(vertex.id);
    }
    keyed
}

fn ensure_unique(keyed: &BTreeMap<EquivalenceKey, Vec<VertexId>>, graph: &str) -> Result<(), DetectionError> {
    match keyed.iter().find(|(_, ids)| ids.len() > 1) {
        Some((key, ids)) => Err(DetectionError::VertexMatching {
            message: format!("{} vertices share one equivalence key", ids.len()),
            key: key.to_string(),
            graph: graph.to_string(),
        }),
        None => Ok(()),
    }
}

fn content_hash_pairs(
    a: &SchemaGraph,
    b: &SchemaGraph,
    candidates_a: &[VertexId],
    candidates_b: &[VertexId],
) -> Vec<(VertexId, VertexId)> {
    let hash_all = |graph: &SchemaGraph, ids: &[VertexId]| {
        let mut hashed: HashMap<String, Vec<VertexId>> = HashMap::new();
        for object in ids.iter().filter_map(|&id| graph.vertex(id)) {
            hashed.entry(content_hash(object)).or_default().push(object.id);
        }
        hashed
    };

    let hashed_a = hash_all(a, candidates_a);
    let hashed_b = hash_all(b, candidates_b);

    let mut pairs: Vec<(VertexId, VertexId)> = hashed_a
        .iter()
        .filter_map(|(hash, ids_a)| match (ids_a.as_slice(), hashed_b.get(hash).map(Vec::as_slice)) {
            ([x], Some([y])) => Some((*x, *y)),
            _ => None,
        })
        .collect();
    pairs.sort_unstable();
    pairs
}

/// Sort pairs and derive the unmatched vertices of both sides
fn partition(a: &SchemaGraph, b: &SchemaGraph, mut pairs: Vec<(VertexId, VertexId)>) -> MatchResult {
    pairs.sort_unstable();

    let matched_a: BTreeSet<VertexId> = pairs.iter().map(|&(x, _)| x).collect();
    let matched_b: BTreeSet<VertexId> = pairs.iter().map(|&(_, y)| y).collect();

    MatchResult {
        unique_a: a.vertices().map(|v| v.id).filter(|id| !matched_a.contains(id)).collect(),
        unique_b: b.vertices().map(|v| v.id).filter(|id| !matched_b.contains(id)).collect(),
        pairs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use schemamerge_graph::GraphBuilder;
    use schemamerge_sql::StatementParser;

    fn build(sql: &str, name: &str) -> SchemaGraph {
        let parsed = StatementParser::new().parse_script(sql);
        GraphBuilder::new().build_from_objects(&parsed.objects, name)
    }

    fn experimental() -> VertexMatcher {
        VertexMatcher::new(MatcherConfig {
            enable_experimental_matching: true,
            ..MatcherConfig::default()
        })
    }

    #[test]
    fn name_similarity_ratio() {
        assert_eq!(name_similarity("", ""), 1.0);
        assert_eq!(name_similarity("abc", ""), 0.0);
        assert_eq!(name_similarity("email", "email"), 1.0);
        assert_eq!(name_similarity("abcd", "bcde"), 0.75);
        assert!(name_similarity("customer_email", "customer_mail") > 0.95);
    }

    #[test]
    fn attribute_similarity_edges() {
        let empty = BTreeMap::new();
        let mut one = BTreeMap::new();
        one.insert("data_type".to_string(), Value::from("TEXT"));

        assert_eq!(attribute_similarity(&empty, &empty), 1.0);
        assert_eq!(attribute_similarity(&empty, &one), 0.0);
        assert_eq!(attribute_similarity(&one, &one), 1.0);

        let mut two = one.clone();
        two.insert("not_null".to_string(), Value::Bool(true));
        assert_eq!(attribute_similarity(&one, &two), 0.5);
    }

    #[test]
    fn identical_graphs_match_completely() {
        let sql = "CREATE TABLE users (id INT PRIMARY KEY, email TEXT UNIQUE)";
        let a = build(sql, "a");
        let b = build(sql, "b");

        let result = VertexMatcher::default().match_graphs(&a, &b).unwrap();
        assert_eq!(result.pairs.len(), a.vertex_count());
        assert!(result.unique_a.is_empty());
        assert!(result.unique_b.is_empty());
    }

    #[test]
    fn keys_ignore_case() {
        let a = build("CREATE TABLE Users (ID INT)", "a");
        let b = build("CREATE TABLE users (id INT)", "b");

        let result = VertexMatcher::default().match_graphs(&a, &b).unwrap();
        assert_eq!(result.pairs, vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn strict_mode_rejects_duplicate_keys() {
        let a = build("CREATE TABLE t (id INT); CREATE TABLE t (id INT);", "a");
        let b = build("CREATE TABLE t (id INT)", "b");

        let err = VertexMatcher::default().match_graphs(&a, &b).unwrap_err();
        match err {
            DetectionError::VertexMatching { graph, .. } => assert_eq!(graph, "a"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn lenient_mode_pairs_duplicates_positionally() {
        let a = build("CREATE TABLE t (id INT); CREATE TABLE t (id INT);", "a");
        let b = build("CREATE TABLE t (id INT)", "b");

        let matcher = VertexMatcher::new(MatcherConfig {
            strict_keys: false,
            ..MatcherConfig::default()
        });
        let result = matcher.match_graphs(&a, &b).unwrap();

        // Tables are ids 1 and 2 in A; only the first one gets a partner
        assert!(result.pairs.contains(&(1, 1)));
        assert!(result.unique_a.contains(&2));
        assert!(result.unique_b.is_empty());
    }

    #[test]
    fn content_hash_pairs_renamed_column() {
        let a = build("CREATE TABLE users (id INT, email TEXT)", "a");
        let b = build("CREATE TABLE users (id INT, email_address TEXT)", "b");

        let strict = VertexMatcher::default().match_graphs(&a, &b).unwrap();
        assert_eq!(strict.unique_a.len(), 1);

        let result = experimental().match_graphs(&a, &b).unwrap();
        assert!(result.unique_a.is_empty());
        assert!(result.unique_b.is_empty());

        let email = a.vertices().find(|v| v.name == "email").unwrap();
        let renamed = b.vertices().find(|v| v.name == "email_address").unwrap();
        assert!(result.pairs.contains(&(email.id, renamed.id)));
        assert_eq!(content_hash(email), content_hash(renamed));
    }

    #[test]
    fn content_hash_requires_experimental_mode() {
        let a = build("CREATE TABLE users (id INT)", "a");

        let err = VertexMatcher::default().match_by_content_hash(&a, &a).unwrap_err();
        assert!(matches!(err, DetectionError::Configuration { .. }));
        assert!(experimental().match_by_content_hash(&a, &a).is_ok());
    }

    #[test]
    fn similarity_pairs_rename_with_type_change() {
        let a = build("CREATE TABLE users (id INT, customer_email TEXT)", "a");
        let b = build("CREATE TABLE users (id INT, customer_mail VARCHAR(200))", "b");

        let result = experimental().match_graphs(&a, &b).unwrap();
        let before = a.vertices().find(|v| v.name == "customer_email").unwrap();
        let after = b.vertices().find(|v| v.name == "customer_mail").unwrap();
        assert!(result.pairs.contains(&(before.id, after.id)));
    }

    #[test]
    fn dissimilar_vertices_stay_unmatched() {
        let a = build("CREATE TABLE users (id INT, email TEXT)", "a");
        let b = build("CREATE TABLE users (id INT, signup_date DATE NOT NULL)", "b");

        let result = experimental().match_graphs(&a, &b).unwrap();
        assert_eq!(result.unique_a.len(), 1);
        assert_eq!(result.unique_b.len(), 1);
    }
}
