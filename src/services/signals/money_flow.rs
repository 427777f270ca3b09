//! Money-flow rules. Only the stock universe carries flow rows.

use super::Classifier;
use crate::config::EngineConfig;
use crate::services::window::Window;
use crate::types::{SignalType, Verdict};

/// Same-sign net flow on every one of the last `days` trading days.
pub struct SustainedFlow {
    days: usize,
}

impl SustainedFlow {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            days: config.sustained_flow_days,
        }
    }
}

impl Classifier for SustainedFlow {
    fn signal_type(&self) -> SignalType {
        SignalType::SustainedFlow
    }

    fn classify(&self, window: &Window, idx: usize) -> Verdict {
        match window.day(idx) {
            Some(day) if day.flow.is_some() => {}
            _ => return Verdict::no_signal("无该日资金数据"),
        }
        let Some(run) = window.trailing(idx, self.days) else {
            return Verdict::neutral("不足连续天数");
        };
        let amounts: Option<Vec<f64>> = run
            .iter()
            .map(|d| d.flow.as_ref().and_then(|f| f.net_amount))
            .collect();
        let Some(amounts) = amounts else {
            return Verdict::neutral("部分日无净流入额");
        };

        if amounts.iter().all(|a| *a > 0.0) {
            Verdict::bullish(format!("连续{}日净流入", self.days))
        } else if amounts.iter().all(|a| *a < 0.0) {
            Verdict::bearish(format!("连续{}日净流出", self.days))
        } else {
            Verdict::neutral("无持续单向净流入/净流出")
        }
    }
}

/// Extra-large order net amount as the main-force proxy.
pub struct MainForce;

impl Classifier for MainForce {
    fn signal_type(&self) -> SignalType {
        SignalType::MainForce
    }

    fn classify(&self, window: &Window, idx: usize) -> Verdict {
        let net = window
            .day(idx)
            .and_then(|d| d.flow.as_ref())
            .and_then(|f| f.main_force_net());
        match net {
            None => Verdict::neutral("无特大单数据"),
            Some(n) if n > 0.0 => Verdict::bullish("主力净流入"),
            Some(n) if n < 0.0 => Verdict::bearish("主力净流出"),
            Some(_) => Verdict::neutral("主力无净流入流出"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::flat_window;
    use super::*;
    use crate::types::{Direction, MoneyFlow};

    fn with_flows(nets: &[Option<f64>]) -> Window {
        let mut w = flat_window(nets.len(), 10.0, 1000.0);
        for (day, net) in w.days.iter_mut().zip(nets) {
            day.flow = net.map(|n| MoneyFlow::net(day.bar.trade_date, n));
        }
        w
    }

    #[test]
    fn test_sustained_inflow_and_outflow() {
        let classifier = SustainedFlow::from_config(&EngineConfig::default());

        let w = with_flows(&[Some(-1.0), Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]);
        let v = classifier.classify(&w, 5);
        assert_eq!(v.direction(), Some(Direction::Bullish));
        assert_eq!(v.reason, "连续5日净流入");
        assert_eq!(classifier.classify(&w, 4).direction(), Some(Direction::Neutral));

        let w = with_flows(&[Some(-1.0); 5]);
        assert_eq!(classifier.classify(&w, 4).direction(), Some(Direction::Bearish));
    }

    #[test]
    fn test_sustained_flow_gaps() {
        let classifier = SustainedFlow::from_config(&EngineConfig::default());

        let w = with_flows(&[Some(1.0), Some(1.0), None, Some(1.0), Some(1.0)]);
        let v = classifier.classify(&w, 4);
        assert_eq!(v.direction(), Some(Direction::Neutral));
        assert_eq!(v.reason, "部分日无净流入额");

        let w = with_flows(&[Some(1.0), Some(1.0), Some(1.0), Some(1.0), None]);
        assert_eq!(classifier.classify(&w, 4).direction(), Some(Direction::NoSignal));

        let w = with_flows(&[Some(1.0); 4]);
        assert_eq!(classifier.classify(&w, 3).reason, "不足连续天数");
    }

    #[test]
    fn test_main_force_sign() {
        let mut w = flat_window(1, 10.0, 1000.0);
        assert_eq!(MainForce.classify(&w, 0).reason, "无特大单数据");

        let mut flow = MoneyFlow::net(w.days[0].bar.trade_date, 0.0);
        flow.extra_large.buy_amount = Some(900.0);
        flow.extra_large.sell_amount = Some(300.0);
        w.days[0].flow = Some(flow.clone());
        assert_eq!(MainForce.classify(&w, 0).direction(), Some(Direction::Bullish));

        flow.extra_large.sell_amount = Some(1200.0);
        w.days[0].flow = Some(flow.clone());
        assert_eq!(MainForce.classify(&w, 0).direction(), Some(Direction::Bearish));

        flow.extra_large.sell_amount = Some(900.0);
        w.days[0].flow = Some(flow);
        assert_eq!(MainForce.classify(&w, 0).direction(), Some(Direction::Neutral));
    }
}
