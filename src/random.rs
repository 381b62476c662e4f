/// Uniform index in `0..len`. `len` must be non-zero.
pub fn index(len: usize) -> usize {
  unsafe { libc::rand() as usize % len }
}

/// Integer between `low` and `high`, both inclusive, in either order.
pub fn between(low: f64, high: f64) -> f64 {
  let (low, high) = if low <= high { (low, high) } else { (high, low) };
  let (low, high) = (low.ceil(), high.floor());
  if low >= high {
    return low;
  }
  let span = high - low + 1.;
  let offset = unsafe { libc::rand() } as f64 % span;
  (low + offset).min(high)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn between_stays_in_bounds() {
    for _ in 0..100 {
      let value = between(5., 1.);
      assert!((1. ..=5.).contains(&value));
      assert_eq!(value.fract(), 0.);
    }
    assert_eq!(between(3., 3.), 3.);
  }

  #[test]
  fn huge_and_unbounded_ranges() {
    for _ in 0..100 {
      let value = between(0., 1e19);
      assert!((0. ..=1e19).contains(&value));
      assert!(between(f64::INFINITY, -2.) >= -2.);
    }
    assert!(between(f64::NAN, 1.).is_nan());
  }

  #[test]
  fn index_stays_below_len() {
    for _ in 0..100 {
      assert!(index(3) < 3);
    }
  }
}
