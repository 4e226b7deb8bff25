//! Congruence file format:
//!
//! ```text
//! [m_1, m_2, ..., m_L]
//! [
//! <r_1,r_2,...,r_L>
//! ...
//! ]
//! ```
//!
//! Columns cover the last `L` levels and are listed by ascending coefficient
//! degree. In memory, moduli and tuples are kept in level order.

use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;

use crate::degree::degree_of;

/// Residue tuples for the levels `n - L + 1..=n`, in level order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CongruenceSet {
    pub moduli: Vec<i64>,
    pub tuples: Vec<Vec<i64>>,
}

/// For each of the last `len` levels (in level order), its column in the
/// degree-ordered file.
fn file_columns(n: usize, len: usize) -> Vec<usize> {
    let levels: Vec<usize> = (n + 1 - len..=n).collect();
    let mut degrees: Vec<usize> = levels.iter().map(|&l| degree_of(n, l)).collect();
    degrees.sort_unstable();
    levels
        .iter()
        .map(|&l| {
            let d = degree_of(n, l);
            degrees.iter().position(|&x| x == d).unwrap_or(0)
        })
        .collect()
}

fn integers(line: &str) -> Result<Vec<i64>> {
    line.split(|c: char| !(c.is_ascii_digit() || c == '-'))
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<i64>()
                .map_err(|_| anyhow!("invalid integer '{}'", t))
        })
        .collect()
}

impl CongruenceSet {
    /// Parse a congruence file for degree `n`.
    pub fn parse(n: usize, text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let header = lines.next().ok_or_else(|| anyhow!("empty congruence file"))?;
        let file_moduli = integers(header).context("reading moduli")?;
        let len = file_moduli.len();
        if len == 0 || len > n {
            bail!(
                "congruence file lists {} moduli, expected between 1 and {}",
                len,
                n
            );
        }
        if let Some(m) = file_moduli.iter().find(|&&m| m < 1) {
            bail!("invalid modulus {}", m);
        }

        let columns = file_columns(n, len);
        let moduli = columns.iter().map(|&c| file_moduli[c]).collect();

        // separator
        lines.next();

        let mut tuples = Vec::new();
        let mut terminated = false;
        for (i, line) in lines.enumerate() {
            if line.trim() == "]" {
                terminated = true;
                break;
            }
            let row = integers(line).with_context(|| format!("tuple line {}", i + 3))?;
            if row.len() != len {
                bail!(
                    "tuple line {} has {} entries, expected {}",
                    i + 3,
                    row.len(),
                    len
                );
            }
            tuples.push(columns.iter().map(|&c| row[c]).collect());
        }
        if !terminated {
            bail!("congruence file is missing its closing ']'");
        }
        if tuples.is_empty() {
            bail!("congruence file contains no tuples");
        }

        Ok(CongruenceSet { moduli, tuples })
    }

    pub fn read(n: usize, path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading congruence file {}", path.display()))?;
        CongruenceSet::parse(n, &text)
            .with_context(|| format!("parsing congruence file {}", path.display()))
    }

    /// Number of levels covered.
    pub fn len(&self) -> usize {
        self.moduli.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moduli.is_empty()
    }

    /// Render in file format for degree `n`.
    pub fn render(&self, n: usize) -> String {
        let columns = file_columns(n, self.len());
        let mut order = vec![0; self.len()];
        for (k, &c) in columns.iter().enumerate() {
            order[c] = k;
        }
        let join = |row: &[i64], sep: &str| {
            order
                .iter()
                .map(|&k| row[k].to_string())
                .collect::<Vec<_>>()
                .join(sep)
        };

        let mut out = String::new();
        out.push_str(&format!("[{}]\n", join(&self.moduli, ", ")));
        out.push_str("[\n");
        for t in &self.tuples {
            out.push_str(&format!("<{}>\n", join(t, ",")));
        }
        out.push_str("]\n");
        out
    }

    pub fn write(&self, n: usize, path: &Path) -> Result<()> {
        std::fs::write(path, self.render(n))
            .with_context(|| format!("writing congruence file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_follow_degree_order() {
        // quintic, last 3 levels are a_2, a_3, a_4: already ascending
        assert_eq!(file_columns(5, 3), vec![0, 1, 2]);
        // last 4 levels are a_5, a_2, a_3, a_4: a_5 is the last column
        assert_eq!(file_columns(5, 4), vec![3, 0, 1, 2]);
    }

    #[test]
    fn parse_reorders_into_level_order() {
        let text = "[2, 3, 5, 7]\n[\n<1,2,3,4>\n<0,-1,4,6>\n]\n";
        let set = CongruenceSet::parse(5, text).unwrap();
        assert_eq!(set.moduli, vec![7, 2, 3, 5]);
        assert_eq!(set.tuples, vec![vec![4, 1, 2, 3], vec![6, 0, -1, 4]]);
    }

    #[test]
    fn render_inverts_parse() {
        let text = "[2, 3, 5, 7]\n[\n<1,2,3,4>\n<0,1,4,6>\n]\n";
        let set = CongruenceSet::parse(5, text).unwrap();
        assert_eq!(set.render(5), text);
    }

    #[test]
    fn trailing_content_after_terminator_is_ignored() {
        let text = "[3, 3]\n[\n<1,2>\n]\nnot read\n";
        let set = CongruenceSet::parse(5, text).unwrap();
        assert_eq!(set.tuples.len(), 1);
    }

    #[test]
    fn malformed_files_are_rejected() {
        let cases = [
            "",
            "[]\n[\n<1>\n]\n",
            "[3, 3]\n[\n<1,2,0>\n]\n",
            "[3, 3]\n[\n<1,2>\n",
            "[3, 3]\n[\n]\n",
            "[3, 0]\n[\n<1,2>\n]\n",
            "[3, 3]\n[\n<1,-->\n]\n",
        ];
        for text in cases {
            assert!(CongruenceSet::parse(5, text).is_err(), "accepted {:?}", text);
        }
    }

    #[test]
    fn read_and_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c5.txt");
        let set = CongruenceSet {
            moduli: vec![5, 5],
            tuples: vec![vec![0, 1], vec![4, 4]],
        };
        set.write(5, &path).unwrap();
        assert_eq!(CongruenceSet::read(5, &path).unwrap(), set);
    }
}
