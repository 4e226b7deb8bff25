use anyhow::{bail, Context, Result};

use crate::horner::{HornerTree, Modular};

/// Enumerates residue tuples for which the discriminant tree is a square
/// modulo a fixed modulus.
///
/// Tuple position `i` holds the residue of the variable at tree depth
/// `depth - 1 - i`, i.e. tuples are in level order.
pub struct CongruenceGenerator {
    tree: HornerTree<Modular>,
    modulus: i64,
    is_square: Vec<bool>,
}

impl CongruenceGenerator {
    pub fn new(tree_text: &str, modulus: i64) -> Result<Self> {
        let ring = Modular::new(modulus)?;
        let tree = HornerTree::parse(ring, tree_text)
            .with_context(|| format!("building tree modulo {}", modulus))?;

        // 0 is a square
        let mut is_square = vec![false; modulus as usize];
        for i in 0..=modulus / 2 {
            is_square[(i * i % modulus) as usize] = true;
        }

        Ok(CongruenceGenerator {
            tree,
            modulus,
            is_square,
        })
    }

    pub fn modulus(&self) -> i64 {
        self.modulus
    }

    pub fn depth(&self) -> usize {
        self.tree.depth()
    }

    /// One modulus per tuple position.
    pub fn moduli(&self) -> Vec<i64> {
        vec![self.modulus; self.depth()]
    }

    pub fn is_square(&self, residue: i64) -> bool {
        self.is_square[residue.rem_euclid(self.modulus) as usize]
    }

    /// All tuples starting with `prefix` (reduced) whose tree value is a
    /// square. Every returned tuple has length `depth()`.
    pub fn generate(&mut self, prefix: &[i64]) -> Result<Vec<Vec<i64>>> {
        let depth = self.depth();
        if prefix.len() > depth {
            bail!(
                "prefix of length {} exceeds tree depth {}",
                prefix.len(),
                depth
            );
        }

        let mut current = Vec::with_capacity(depth);
        for (i, &c) in prefix.iter().enumerate() {
            let c = c.rem_euclid(self.modulus);
            self.tree.eval_i64(depth - 1 - i, c);
            current.push(c);
        }

        let mut out = Vec::new();
        self.recurse(depth - prefix.len(), &mut current, &mut out);
        Ok(out)
    }

    /// Assign every residue to the variables at depths `< remaining`,
    /// deepest first.
    fn recurse(&mut self, remaining: usize, current: &mut Vec<i64>, out: &mut Vec<Vec<i64>>) {
        if remaining == 0 {
            if self.is_square[*self.tree.value() as usize] {
                out.push(current.clone());
            }
            return;
        }
        let depth = remaining - 1;
        for c in 0..self.modulus {
            self.tree.eval_i64(depth, c);
            current.push(c);
            self.recurse(depth, current, out);
            current.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Brute-force reference: every tuple of the cube, evaluated from
    /// scratch.
    fn brute_force(tree_text: &str, m: i64) -> Vec<Vec<i64>> {
        let tree = HornerTree::parse(Modular::new(m).unwrap(), tree_text).unwrap();
        let gen = CongruenceGenerator::new(tree_text, m).unwrap();
        let depth = tree.depth();
        let mut out = Vec::new();
        let total = (m as usize).pow(depth as u32);
        for code in 0..total {
            let mut tuple = vec![0i64; depth];
            let mut rest = code;
            for i in (0..depth).rev() {
                tuple[i] = (rest % m as usize) as i64;
                rest /= m as usize;
            }
            // tuple position i is depth `depth - 1 - i`
            let values: Vec<i64> = (0..depth).map(|d| tuple[depth - 1 - d]).collect();
            if gen.is_square(tree.evaluate_at(&values)) {
                out.push(tuple);
            }
        }
        out
    }

    #[test]
    fn squares_table_includes_zero() {
        let gen = CongruenceGenerator::new("[[1],[]]", 7).unwrap();
        let squares: Vec<i64> = (0..7).filter(|&r| gen.is_square(r)).collect();
        assert_eq!(squares, vec![0, 1, 2, 4]);
    }

    #[test]
    fn sum_of_squares_matches_brute_force() {
        let text = "[[1],[],[1,,]]";
        let mut gen = CongruenceGenerator::new(text, 5).unwrap();
        assert_eq!(gen.depth(), 2);
        let tuples = gen.generate(&[]).unwrap();
        assert_eq!(tuples, brute_force(text, 5));
        assert!(tuples.iter().all(|t| t.len() == 2));
    }

    #[test]
    fn asymmetric_tree_matches_brute_force() {
        let text = "[[2,0,1],[3,1],[[1,4],2,-1]]";
        let mut gen = CongruenceGenerator::new(text, 7).unwrap();
        let tuples = gen.generate(&[]).unwrap();
        assert_eq!(tuples, brute_force(text, 7));
    }

    #[test]
    fn prefix_restricts_and_is_reduced() {
        let text = "[[1],[],[1,,]]";
        let mut gen = CongruenceGenerator::new(text, 5).unwrap();
        let all = gen.generate(&[]).unwrap();
        let with_prefix = gen.generate(&[-3]).unwrap();
        let expected: Vec<Vec<i64>> = all.into_iter().filter(|t| t[0] == 2).collect();
        assert_eq!(with_prefix, expected);
    }

    #[test]
    fn prefix_longer_than_depth_is_rejected() {
        let mut gen = CongruenceGenerator::new("[[1],[]]", 3).unwrap();
        assert!(gen.generate(&[0, 1]).is_err());
    }

    #[test]
    fn full_prefix_yields_at_most_itself() {
        let text = "[[1],[],[1,,]]";
        let mut gen = CongruenceGenerator::new(text, 3).unwrap();
        // 1^2 + 1^2 = 2 is not a square mod 3
        assert!(gen.generate(&[1, 1]).unwrap().is_empty());
        assert_eq!(gen.generate(&[1, 0]).unwrap(), vec![vec![1, 0]]);
    }
}
