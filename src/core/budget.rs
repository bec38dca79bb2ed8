//! 步数预算：每次调用模型前后由引擎递减，只减不增

/// 剩余步数小于该值且模型仍请求工具时，触发预算兜底
pub const FALLBACK_THRESHOLD: usize = 2;

/// 单轮的模型↔工具循环预算
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepBudget {
    max: usize,
    remaining: usize,
}

impl StepBudget {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            remaining: max,
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn used(&self) -> usize {
        self.max - self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// 递减一步；已为 0 时保持 0
    pub fn decrement(&mut self) {
        if self.remaining == 0 {
            tracing::warn!("step budget decremented while exhausted");
            return;
        }
        self.remaining -= 1;
    }

    /// 给定调用前的剩余步数，是否应丢弃工具调用并兜底
    pub fn should_fallback(remaining_before_call: usize, has_tool_calls: bool) -> bool {
        has_tool_calls && remaining_before_call < FALLBACK_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrement_is_monotonic_and_saturating() {
        let mut b = StepBudget::new(2);
        b.decrement();
        assert_eq!(b.remaining(), 1);
        b.decrement();
        assert_eq!(b.remaining(), 0);
        assert!(b.is_exhausted());
        b.decrement();
        assert_eq!(b.remaining(), 0);
        assert_eq!(b.used(), 2);
    }

    #[test]
    fn test_should_fallback() {
        assert!(StepBudget::should_fallback(1, true));
        assert!(!StepBudget::should_fallback(1, false));
        assert!(!StepBudget::should_fallback(2, true));
    }
}
