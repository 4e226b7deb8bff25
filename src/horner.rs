//! # Horner: Incremental Multivariate Discriminant Evaluation
//!
//! The discriminant (divided by the target) is a polynomial in the free
//! coefficients. It is stored as a nested Horner scheme: a node at depth `d`
//! is a polynomial in the depth-`d` variable whose coefficients are its
//! children, themselves polynomials in deeper variables. Assigning the
//! depth-`d` variable re-evaluates only the internal nodes of depth `d`:
//!
//! ```text
//! value = child_0
//! for each further child c: value = value * x + c     (c = 0 if omitted)
//! ```
//!
//! Variables must be assigned deepest first, so that every child is current
//! when its parent is evaluated.
//!
//! ## Text Format
//!
//! One line of nested brackets. A group is `[item, item, ...]` and an item is
//! a nested group, an integer, or nothing (an omitted zero child):
//!
//! - `[5]` is the constant leaf 5 at the group's own depth;
//! - `[]` is an omitted child;
//! - any other group is an internal node, and its bare integers are leaves
//!   one level deeper.
//!
//! `[[1],[],[1,,]]` is `y^2 + x^2` with y at depth 0 and x at depth 1.
//!
//! The comma between two groups is optional, so the separator-free form
//! where every child is a group, `[[1][][[1][][]]]`, reads as the same tree.
//!
//! ## Rings
//!
//! One generic tree serves both evaluators: [`Exact`] over `rug::Integer`
//! and [`Modular`] over `i64` residues, reduced after every step.

use anyhow::{anyhow, bail, Context, Result};
use rug::Integer;
use std::fmt::Debug;

/// Arithmetic used by a [`HornerTree`].
pub trait HornerRing {
    type Value: Clone + Debug + Default;

    fn zero(&self) -> Self::Value;
    fn is_zero(&self, v: &Self::Value) -> bool;
    fn parse(&self, literal: &str) -> Result<Self::Value>;
    fn from_i64(&self, x: i64) -> Self::Value;
    /// `acc = acc * x + c`
    fn mul_add(&self, acc: &mut Self::Value, x: &Self::Value, c: Option<&Self::Value>);
    fn assign(&self, dst: &mut Self::Value, src: &Self::Value);
}

/// Arbitrary-precision integers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exact;

impl HornerRing for Exact {
    type Value = Integer;

    fn zero(&self) -> Integer {
        Integer::new()
    }

    fn is_zero(&self, v: &Integer) -> bool {
        *v == 0
    }

    fn parse(&self, literal: &str) -> Result<Integer> {
        Integer::from_str_radix(literal, 10)
            .with_context(|| format!("invalid integer literal '{}'", literal))
    }

    fn from_i64(&self, x: i64) -> Integer {
        Integer::from(x)
    }

    fn mul_add(&self, acc: &mut Integer, x: &Integer, c: Option<&Integer>) {
        *acc *= x;
        if let Some(c) = c {
            *acc += c;
        }
    }

    fn assign(&self, dst: &mut Integer, src: &Integer) {
        dst.clone_from(src);
    }
}

/// Residues modulo `m` (m < 2^31), canonical in `[0, m)`.
#[derive(Debug, Clone, Copy)]
pub struct Modular {
    m: i64,
}

impl Modular {
    pub fn new(m: i64) -> Result<Self> {
        if m < 2 || m >= 1 << 31 {
            bail!("modulus {} outside supported range 2..2^31", m);
        }
        Ok(Modular { m })
    }

    pub fn modulus(&self) -> i64 {
        self.m
    }
}

impl HornerRing for Modular {
    type Value = i64;

    fn zero(&self) -> i64 {
        0
    }

    fn is_zero(&self, v: &i64) -> bool {
        *v == 0
    }

    fn parse(&self, literal: &str) -> Result<i64> {
        let big = Exact.parse(literal)?;
        Ok(big.mod_u(self.m as u32) as i64)
    }

    fn from_i64(&self, x: i64) -> i64 {
        x.rem_euclid(self.m)
    }

    fn mul_add(&self, acc: &mut i64, x: &i64, c: Option<&i64>) {
        let mut v = *acc * *x;
        if let Some(c) = c {
            v += *c;
        }
        *acc = v % self.m;
    }

    fn assign(&self, dst: &mut i64, src: &i64) {
        *dst = *src;
    }
}

type NodeId = usize;

#[derive(Debug, Clone)]
struct Node<V> {
    value: V,
    children: Vec<Option<NodeId>>,
}

impl<V> Node<V> {
    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena-backed Horner tree over a ring.
#[derive(Debug, Clone)]
pub struct HornerTree<R: HornerRing> {
    ring: R,
    nodes: Vec<Node<R::Value>>,
    root: Option<NodeId>,
    /// Internal nodes per depth.
    slices: Vec<Vec<NodeId>>,
    zero: R::Value,
}

/// One comma-separated entry of a group, before it becomes a child.
enum Item<V> {
    Empty,
    Literal(V),
    Group(Option<NodeId>),
}

struct Parser<'a, R: HornerRing> {
    ring: &'a R,
    chars: Vec<char>,
    pos: usize,
    nodes: Vec<Node<R::Value>>,
    slices: Vec<Vec<NodeId>>,
}

impl<R: HornerRing> Parser<'_, R> {
    fn touch(&mut self, depth: usize) {
        while self.slices.len() <= depth {
            self.slices.push(Vec::new());
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn push(&mut self, value: R::Value, children: Vec<Option<NodeId>>) -> NodeId {
        self.nodes.push(Node { value, children });
        self.nodes.len() - 1
    }

    fn literal(&mut self) -> Result<R::Value> {
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.ring.parse(&text)
    }

    /// Parse a group starting at `[`, located at `depth`.
    fn group(&mut self, depth: usize) -> Result<Option<NodeId>> {
        self.touch(depth);
        if self.peek() != Some('[') {
            bail!("expected '[' at column {}", self.pos + 1);
        }
        self.pos += 1;

        let mut items: Vec<Item<R::Value>> = Vec::new();
        let mut current = Item::Empty;
        loop {
            self.skip_ws();
            match self.peek() {
                None => bail!("unterminated group opened at depth {}", depth),
                Some('[') => {
                    match current {
                        Item::Empty => {}
                        // adjacent groups need no separator
                        Item::Group(_) => items.push(std::mem::replace(&mut current, Item::Empty)),
                        Item::Literal(_) => bail!("missing ',' before column {}", self.pos + 1),
                    }
                    current = Item::Group(self.group(depth + 1)?);
                }
                Some(',') => {
                    self.pos += 1;
                    items.push(std::mem::replace(&mut current, Item::Empty));
                }
                Some(']') => {
                    self.pos += 1;
                    items.push(current);
                    break;
                }
                Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => {
                    if !matches!(current, Item::Empty) {
                        bail!("missing ',' before column {}", self.pos + 1);
                    }
                    current = Item::Literal(self.literal()?);
                }
                Some(c) => bail!("unexpected '{}' at column {}", c, self.pos + 1),
            }
        }

        if items.len() == 1 {
            match items.pop() {
                Some(Item::Literal(v)) => return Ok(Some(self.push(v, Vec::new()))),
                Some(Item::Empty) => return Ok(None),
                Some(other) => items.push(other),
                None => {}
            }
        }

        self.touch(depth + 1);
        let mut children = Vec::with_capacity(items.len());
        for item in items {
            children.push(match item {
                Item::Empty => None,
                Item::Literal(v) => Some(self.push(v, Vec::new())),
                Item::Group(id) => id,
            });
        }
        let id = self.push(self.ring.zero(), children);
        self.slices[depth].push(id);
        Ok(Some(id))
    }
}

impl<R: HornerRing> HornerTree<R> {
    /// Parse the first line of `text` and optimise the tree.
    pub fn parse(ring: R, text: &str) -> Result<Self> {
        let line = text.lines().next().unwrap_or("");
        let mut parser = Parser {
            ring: &ring,
            chars: line.chars().collect(),
            pos: 0,
            nodes: Vec::new(),
            slices: Vec::new(),
        };
        parser.skip_ws();
        if parser.peek().is_none() {
            bail!("empty tree description");
        }
        let root = parser.group(0).context("malformed tree description")?;
        parser.skip_ws();
        if let Some(c) = parser.peek() {
            return Err(anyhow!(
                "trailing '{}' at column {} after tree description",
                c,
                parser.pos + 1
            ));
        }

        let Parser { nodes, slices, .. } = parser;
        let zero = ring.zero();
        let mut tree = HornerTree {
            ring,
            nodes,
            root,
            slices,
            zero,
        };
        if let Some(root) = tree.root {
            tree.optimize(root);
        }
        let nodes = &tree.nodes;
        for slice in &mut tree.slices {
            slice.retain(|&id| !nodes[id].is_leaf());
        }
        Ok(tree)
    }

    /// Drop leading zero children, then fold a single leaf child into its
    /// parent. Post-order, so children are final before their parent.
    fn optimize(&mut self, id: NodeId) {
        let children = self.nodes[id].children.clone();
        for child in children.into_iter().flatten() {
            self.optimize(child);
        }

        let was_internal = !self.nodes[id].is_leaf();
        let leading = self.nodes[id]
            .children
            .iter()
            .take_while(|c| match c {
                None => true,
                Some(c) => self.nodes[*c].is_leaf() && self.ring.is_zero(&self.nodes[*c].value),
            })
            .count();
        self.nodes[id].children.drain(..leading);

        if was_internal && self.nodes[id].is_leaf() {
            self.nodes[id].value = self.ring.zero();
        }

        if let [Some(only)] = self.nodes[id].children[..] {
            if self.nodes[only].is_leaf() {
                let value = self.nodes[only].value.clone();
                self.nodes[id].value = value;
                self.nodes[id].children.clear();
            }
        }
    }

    pub fn ring(&self) -> &R {
        &self.ring
    }

    /// Number of variables: one per depth touched by the description,
    /// not counting the deepest (constants only).
    pub fn depth(&self) -> usize {
        self.slices.len().saturating_sub(1)
    }

    /// Assign `x` to the depth-`depth` variable.
    pub fn eval(&mut self, depth: usize, x: &R::Value) {
        let Some(slice) = self.slices.get(depth) else {
            return;
        };
        for i in 0..slice.len() {
            let id = self.slices[depth][i];
            let mut acc = std::mem::take(&mut self.nodes[id].value);
            let node = &self.nodes[id];
            match node.children[0] {
                Some(c) => self.ring.assign(&mut acc, &self.nodes[c].value),
                None => self.ring.assign(&mut acc, &self.zero),
            }
            for child in &node.children[1..] {
                let c = child.map(|c| &self.nodes[c].value);
                self.ring.mul_add(&mut acc, x, c);
            }
            self.nodes[id].value = acc;
        }
    }

    pub fn eval_i64(&mut self, depth: usize, x: i64) {
        let x = self.ring.from_i64(x);
        self.eval(depth, &x);
    }

    /// Current value of the root.
    pub fn value(&self) -> &R::Value {
        match self.root {
            Some(root) => &self.nodes[root].value,
            None => &self.zero,
        }
    }

    /// Evaluate from scratch with `values[d]` assigned to depth `d`.
    pub fn evaluate_at(&self, values: &[R::Value]) -> R::Value {
        match self.root {
            Some(root) => self.evaluate_node(root, 0, values),
            None => self.ring.zero(),
        }
    }

    fn evaluate_node(&self, id: NodeId, depth: usize, values: &[R::Value]) -> R::Value {
        let node = &self.nodes[id];
        if node.is_leaf() {
            return node.value.clone();
        }
        let mut acc = match node.children[0] {
            Some(c) => self.evaluate_node(c, depth + 1, values),
            None => self.ring.zero(),
        };
        for child in &node.children[1..] {
            let c = child.map(|c| self.evaluate_node(c, depth + 1, values));
            self.ring.mul_add(&mut acc, &values[depth], c.as_ref());
        }
        acc
    }

    /// Number of internal nodes evaluated at `depth`.
    pub fn slice_len(&self, depth: usize) -> usize {
        self.slices.get(depth).map_or(0, Vec::len)
    }
}
