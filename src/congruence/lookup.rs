use anyhow::{bail, Result};

use crate::arith::modulo;

type NodeId = usize;

#[derive(Debug, Clone)]
struct TrieNode {
    parent: Option<NodeId>,
    children: Vec<Option<NodeId>>,
    values: Vec<i64>,
}

impl TrieNode {
    fn new(parent: Option<NodeId>, arity: usize) -> Self {
        TrieNode {
            parent,
            children: vec![None; arity],
            values: Vec::new(),
        }
    }
}

/// Prefix trie over residue tuples with a backtracking cursor.
///
/// A tuple of length `L` is stored along a path of `L - 1` edges; its last
/// entry is appended to the values of the node reached. The cursor follows
/// the enumeration one level per `walk` and one level up per `back`. Once a
/// walk misses, further walks only count an overflow depth, which `back`
/// unwinds before moving the cursor again.
#[derive(Debug, Clone)]
pub struct CongruenceLookup {
    nodes: Vec<TrieNode>,
    moduli: Vec<i64>,
    marker: NodeId,
    overflow: usize,
}

impl CongruenceLookup {
    pub fn new(tuples: &[Vec<i64>], moduli: &[i64]) -> Result<Self> {
        if moduli.is_empty() {
            bail!("congruence lookup needs at least one modulus");
        }
        if let Some(m) = moduli.iter().find(|&&m| m < 1) {
            bail!("invalid modulus {} in congruence lookup", m);
        }

        let len = moduli.len();
        let root_arity = if len > 1 { moduli[0] as usize } else { 0 };
        let mut lookup = CongruenceLookup {
            nodes: vec![TrieNode::new(None, root_arity)],
            moduli: moduli.to_vec(),
            marker: 0,
            overflow: 0,
        };
        for tuple in tuples {
            if tuple.len() != len {
                bail!(
                    "congruence tuple of length {} does not match {} moduli",
                    tuple.len(),
                    len
                );
            }
            lookup.insert(tuple);
        }
        Ok(lookup)
    }

    fn insert(&mut self, tuple: &[i64]) {
        let len = self.moduli.len();
        let mut current = 0;
        for i in 0..len - 1 {
            let slot = modulo(tuple[i], self.moduli[i]) as usize;
            current = match self.nodes[current].children[slot] {
                Some(next) => next,
                None => {
                    let arity = if i + 2 < len {
                        self.moduli[i + 1] as usize
                    } else {
                        0
                    };
                    self.nodes.push(TrieNode::new(Some(current), arity));
                    let id = self.nodes.len() - 1;
                    self.nodes[current].children[slot] = Some(id);
                    id
                }
            };
        }
        self.nodes[current].values.push(tuple[len - 1]);
    }

    pub fn moduli(&self) -> &[i64] {
        &self.moduli
    }

    /// Descend along residue `c`. Returns false (and overflows) if no stored
    /// tuple continues the current prefix with `c`.
    pub fn walk(&mut self, c: i64) -> bool {
        if self.overflow == 0 {
            let node = &self.nodes[self.marker];
            if !node.children.is_empty() {
                let slot = modulo(c, node.children.len() as i64) as usize;
                if let Some(next) = node.children[slot] {
                    self.marker = next;
                    return true;
                }
            }
        }
        self.overflow += 1;
        false
    }

    pub fn walk_dummy(&mut self) {
        self.overflow += 1;
    }

    pub fn back(&mut self) {
        if self.overflow > 0 {
            self.overflow -= 1;
        } else if let Some(parent) = self.nodes[self.marker].parent {
            self.marker = parent;
        }
    }

    pub fn reset(&mut self) {
        self.marker = 0;
        self.overflow = 0;
    }

    pub fn overflowed(&self) -> bool {
        self.overflow > 0
    }

    /// Last-position residues stored at the cursor, None while overflowed.
    pub fn values(&self) -> Option<&[i64]> {
        (self.overflow == 0).then(|| self.nodes[self.marker].values.as_slice())
    }

    /// `(node, overflow depth)`.
    pub fn cursor(&self) -> (usize, usize) {
        (self.marker, self.overflow)
    }
}
