//! Fisher's exact test on a 2×2 contingency table, computed as the
//! hypergeometric tail in the direction of the observed movement.
//!
//! Point probabilities are accumulated in log space and exponentiated at
//! the end, which keeps tables with a few thousand runs well inside double
//! precision.

/// Cumulative log-factorial table: `ln(n!)` for `0..=n`.
struct LnFactorial {
    table: Vec<f64>,
}

impl LnFactorial {
    fn new(n: usize) -> Self {
        let mut table = Vec::with_capacity(n + 1);
        table.push(0.0);
        let mut acc = 0.0;
        for i in 1..=n {
            acc += (i as f64).ln();
            table.push(acc);
        }
        Self { table }
    }

    fn get(&self, n: u64) -> f64 {
        self.table[n as usize]
    }

    /// Log point probability of the table [[a, b], [c, d]] under fixed
    /// margins.
    fn ln_hypergeometric(&self, a: u64, b: u64, c: u64, d: u64) -> f64 {
        self.get(a + b) + self.get(c + d) + self.get(a + c) + self.get(b + d)
            - self.get(a)
            - self.get(b)
            - self.get(c)
            - self.get(d)
            - self.get(a + b + c + d)
    }
}

/// Probability of observing `a` or more in the top-left cell of the table
/// [[a, b], [c, d]] with margins fixed. With failures in the first column
/// this is the chance the sample saw at least its observed failure count
/// if base and sample shared one underlying rate; lower means stronger
/// evidence of movement.
///
/// Degenerate tables (empty, or an empty first column) return 1.0.
pub fn right_tail(a: u64, b: u64, c: u64, d: u64) -> f64 {
    let row1 = a + b;
    let col1 = a + c;
    let n = a + b + c + d;
    if n == 0 || col1 == 0 || row1 == 0 {
        return 1.0;
    }
    let ln_fact = LnFactorial::new(n as usize);
    let hi = row1.min(col1);
    let mut sum = 0.0;
    for x in a..=hi {
        let b_x = row1 - x;
        let c_x = col1 - x;
        let d_x = (c + d) - c_x;
        sum += ln_fact.ln_hypergeometric(x, b_x, c_x, d_x).exp();
    }
    sum.min(1.0)
}
