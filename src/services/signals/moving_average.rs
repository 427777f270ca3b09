//! Moving-average cross and alignment rules.

use super::Classifier;
use crate::services::window::Window;
use crate::types::{SignalType, Verdict};

/// MA5 or MA10 crossing MA20 between yesterday and today.
///
/// Only the immediately preceding day is compared; a cross that happened
/// two days ago is not reported.
pub struct MaCross;

impl Classifier for MaCross {
    fn signal_type(&self) -> SignalType {
        SignalType::MaCross
    }

    fn classify(&self, window: &Window, idx: usize) -> Verdict {
        let Some(today) = window.day(idx) else {
            return Verdict::no_signal("无该日技术指标");
        };
        if idx == 0 {
            return Verdict::neutral("无前一日数据");
        }
        let t = today.ma;
        let p = window.days[idx - 1].ma;
        let (Some(ma5), Some(ma20), Some(p5), Some(p20)) = (t.ma5, t.ma20, p.ma5, p.ma20) else {
            return Verdict::neutral("均线数据不全");
        };
        let ten = t.ma10.zip(p.ma10);

        let golden = (p5 <= p20 && ma5 > ma20)
            || ten.map_or(false, |(ma10, p10)| p10 <= p20 && ma10 > ma20);
        let death = (p5 >= p20 && ma5 < ma20)
            || ten.map_or(false, |(ma10, p10)| p10 >= p20 && ma10 < ma20);

        if golden {
            Verdict::bullish("均线金叉")
        } else if death {
            Verdict::bearish("均线死叉")
        } else {
            Verdict::neutral("无金叉死叉")
        }
    }
}

/// Strict ordering of MA5, MA10 and MA20.
pub struct MaAlignment;

impl Classifier for MaAlignment {
    fn signal_type(&self) -> SignalType {
        SignalType::MaAlignment
    }

    fn classify(&self, window: &Window, idx: usize) -> Verdict {
        let ma = match window.day(idx) {
            Some(day) => day.ma,
            None => return Verdict::neutral("均线数据不全"),
        };
        let (Some(ma5), Some(ma10), Some(ma20)) = (ma.ma5, ma.ma10, ma.ma20) else {
            return Verdict::neutral("均线数据不全");
        };
        if ma5 > ma10 && ma10 > ma20 {
            Verdict::bullish("多头排列")
        } else if ma5 < ma10 && ma10 < ma20 {
            Verdict::bearish("空头排列")
        } else {
            Verdict::neutral("均线纠缠")
        }
    }
}
