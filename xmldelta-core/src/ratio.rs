use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Which sequence-similarity ratio the differ uses when comparing node
/// fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RatioMode {
    /// Upper bound on [`RatioMode::Accurate`] from multiset intersection.
    #[default]
    Fast,
    /// Ratcliff/Obershelp similarity.
    Accurate,
    /// Cheapest upper bound, from the lengths alone.
    Faster,
}

impl FromStr for RatioMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(RatioMode::Fast),
            "accurate" => Ok(RatioMode::Accurate),
            "faster" => Ok(RatioMode::Faster),
            other => Err(format!("unknown ratio mode '{other}'")),
        }
    }
}

impl fmt::Display for RatioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RatioMode::Fast => "fast",
            RatioMode::Accurate => "accurate",
            RatioMode::Faster => "faster",
        })
    }
}

impl RatioMode {
    pub fn ratio(&self, left: &str, right: &str) -> f64 {
        match self {
            RatioMode::Accurate => ratio(left, right),
            RatioMode::Fast => quick_ratio(left, right),
            RatioMode::Faster => real_quick_ratio(left, right),
        }
    }
}

fn scale(matches: usize, length: usize) -> f64 {
    if length == 0 {
        1.0
    } else {
        2.0 * matches as f64 / length as f64
    }
}

/// Ratcliff/Obershelp similarity of two strings over chars: twice the
/// number of matching characters across all recursively longest matching
/// blocks, divided by the total length.
pub fn ratio(left: &str, right: &str) -> f64 {
    let a: Vec<char> = left.chars().collect();
    let b: Vec<char> = right.chars().collect();

    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, ch) in b.iter().enumerate() {
        b2j.entry(*ch).or_default().push(j);
    }

    let mut matches = 0;
    // Queue of (alo, ahi, blo, bhi) regions still to examine.
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (besti, bestj, size) = longest_match(&a, &b2j, alo, ahi, blo, bhi);
        if size > 0 {
            matches += size;
            queue.push((alo, besti, blo, bestj));
            queue.push((besti + size, ahi, bestj + size, bhi));
        }
    }
    scale(matches, a.len() + b.len())
}

fn longest_match(
    a: &[char],
    b2j: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut besti, mut bestj, mut bestsize) = (alo, blo, 0);
    let mut j2len: HashMap<usize, usize> = HashMap::new();
    for i in alo..ahi {
        let mut newj2len: HashMap<usize, usize> = HashMap::new();
        if let Some(indices) = b2j.get(&a[i]) {
            for &j in indices {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j2len.get(&j.wrapping_sub(1)).copied().unwrap_or(0) + 1;
                newj2len.insert(j, k);
                if k > bestsize {
                    besti = i + 1 - k;
                    bestj = j + 1 - k;
                    bestsize = k;
                }
            }
        }
        j2len = newj2len;
    }
    (besti, bestj, bestsize)
}

/// Upper bound on [`ratio`] counting, per character, the minimum of its
/// occurrence counts on either side.
pub fn quick_ratio(left: &str, right: &str) -> f64 {
    let mut fullbcount: HashMap<char, isize> = HashMap::new();
    let mut total = 0usize;
    for ch in right.chars() {
        *fullbcount.entry(ch).or_insert(0) += 1;
        total += 1;
    }

    let mut avail: HashMap<char, isize> = HashMap::new();
    let mut matches = 0usize;
    let mut left_len = 0usize;
    for ch in left.chars() {
        left_len += 1;
        let numb = *avail
            .entry(ch)
            .or_insert_with(|| fullbcount.get(&ch).copied().unwrap_or(0));
        avail.insert(ch, numb - 1);
        if numb > 0 {
            matches += 1;
        }
    }
    scale(matches, left_len + total)
}

/// Cheapest upper bound on [`ratio`], from the lengths alone.
pub fn real_quick_ratio(left: &str, right: &str) -> f64 {
    let la = left.chars().count();
    let lb = right.chars().count();
    scale(la.min(lb), la + lb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_are_fully_similar() {
        for mode in [RatioMode::Fast, RatioMode::Accurate, RatioMode::Faster] {
            assert_eq!(mode.ratio("node text attr:1", "node text attr:1"), 1.0);
            assert_eq!(mode.ratio("", ""), 1.0);
        }
    }

    #[test]
    fn disjoint_strings_have_zero_accurate_ratio() {
        assert_eq!(ratio("abc", "xyz"), 0.0);
        assert_eq!(quick_ratio("abc", "xyz"), 0.0);
    }

    #[test]
    fn accurate_matches_known_difflib_value() {
        // difflib: SequenceMatcher(None, "abcd", "bcde").ratio() == 0.75
        assert!((ratio("abcd", "bcde") - 0.75).abs() < 1e-12);
    }

    #[test]
    fn quick_ratio_bounds_accurate_ratio() {
        let cases = [("abcd", "bcde"), ("hello world", "hello there"), ("a", "ab")];
        for (l, r) in cases {
            assert!(quick_ratio(l, r) >= ratio(l, r));
            assert!(real_quick_ratio(l, r) >= quick_ratio(l, r));
        }
    }

    #[test]
    fn unknown_mode_fails_to_parse() {
        assert!("fastest".parse::<RatioMode>().is_err());
        assert_eq!("accurate".parse::<RatioMode>().unwrap(), RatioMode::Accurate);
    }
}
