use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use crate::error::{AppError, AppResult};
use crate::models::{PrizeDefinition, PrizeResponse};

/// 按权重抽奖的奖品表
///
/// `WeightedIndex` 内部是累计权重 + 二分查找，每个奖品被抽中的概率为
/// `weight / sum(weights)`。
#[derive(Debug, Clone)]
pub struct PrizeTable {
    prizes: Vec<PrizeDefinition>,
    index: WeightedIndex<u32>,
    total_weight: u32,
}

impl PrizeTable {
    pub fn new(prizes: Vec<PrizeDefinition>) -> AppResult<Self> {
        let index = WeightedIndex::new(prizes.iter().map(|p| p.weight))
            .map_err(|e| AppError::ConfigError(format!("invalid prize weights: {e}")))?;
        let total_weight = prizes.iter().map(|p| p.weight).sum();
        Ok(Self {
            prizes,
            index,
            total_weight,
        })
    }

    pub fn prizes(&self) -> &[PrizeDefinition] {
        &self.prizes
    }

    pub fn len(&self) -> usize {
        self.prizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prizes.is_empty()
    }

    pub fn probability(&self, index: usize) -> f64 {
        self.prizes
            .get(index)
            .map(|p| f64::from(p.weight) / f64::from(self.total_weight))
            .unwrap_or(0.0)
    }

    /// 抽取一个奖品，返回其在转盘上的序号
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> (usize, &PrizeDefinition) {
        let i = self.index.sample(rng);
        (i, &self.prizes[i])
    }

    pub fn wheel_angle<R: Rng + ?Sized>(&self, won_index: usize, rng: &mut R) -> f64 {
        wheel_angle(self.len(), won_index, rng)
    }

    pub fn to_responses(&self) -> Vec<PrizeResponse> {
        self.prizes
            .iter()
            .enumerate()
            .map(|(i, p)| PrizeResponse {
                index: i,
                name: p.name.clone(),
                value: p.value,
                weight: p.weight,
                probability_percent: self.probability(i) * 100.0,
            })
            .collect()
    }
}

/// Final rotation (degrees) that leaves the pointer inside sector
/// `won_index`, away from the sector edges.
pub fn wheel_angle<R: Rng + ?Sized>(sector_count: usize, won_index: usize, rng: &mut R) -> f64 {
    let sector = 360.0 / sector_count.max(1) as f64;
    let offset = rng.gen_range(sector * 0.1..sector * 0.9);
    360.0 - (won_index as f64 * sector + offset)
}

/// 达到的消费门槛数量即最多可抽奖次数
pub fn max_spins_for(thresholds: &[f64], total_spent: f64) -> u32 {
    thresholds.iter().filter(|t| total_spent >= **t).count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn reference_table() -> PrizeTable {
        PrizeTable::new(EventConfig::default().prizes).unwrap()
    }

    #[test]
    fn test_max_spins_counts_thresholds_met() {
        let thresholds = [500_000.0, 1_000_000.0, 2_000_000.0, 3_500_000.0, 5_000_000.0];
        assert_eq!(max_spins_for(&thresholds, 0.0), 0);
        assert_eq!(max_spins_for(&thresholds, 499_999.0), 0);
        assert_eq!(max_spins_for(&thresholds, 500_000.0), 1);
        assert_eq!(max_spins_for(&thresholds, 1_200_000.0), 2);
        assert_eq!(max_spins_for(&thresholds, 5_000_000.0), 5);
        assert_eq!(max_spins_for(&thresholds, 90_000_000.0), 5);
        assert_eq!(max_spins_for(&[], 1_000.0), 0);
    }

    #[test]
    fn test_draw_distribution_matches_weights() {
        let table = reference_table();
        let mut rng = StdRng::seed_from_u64(7);
        let draws = 100_000;
        let mut counts = vec![0u32; table.len()];
        for _ in 0..draws {
            let (i, _) = table.draw(&mut rng);
            counts[i] += 1;
        }

        for (i, count) in counts.iter().enumerate() {
            let observed = f64::from(*count) / f64::from(draws);
            let expected = table.probability(i);
            assert!(
                (observed - expected).abs() < 0.015,
                "prize {i}: observed {observed}, expected {expected}"
            );
        }
    }

    #[test]
    fn test_zero_weight_never_drawn() {
        let table = PrizeTable::new(vec![
            PrizeDefinition::new("never", 100.0, 0),
            PrizeDefinition::new("always", 0.0, 1),
        ])
        .unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1_000 {
            assert_eq!(table.draw(&mut rng).0, 1);
        }
    }

    #[test]
    fn test_all_zero_weights_rejected() {
        let result = PrizeTable::new(vec![PrizeDefinition::new("x", 0.0, 0)]);
        assert!(matches!(result, Err(AppError::ConfigError(_))));
        assert!(PrizeTable::new(Vec::new()).is_err());
    }

    #[test]
    fn test_wheel_angle_lands_inside_sector() {
        let table = reference_table();
        let sector = 360.0 / table.len() as f64;
        let mut rng = StdRng::seed_from_u64(3);
        for won in 0..table.len() {
            for _ in 0..100 {
                let angle = table.wheel_angle(won, &mut rng);
                let landed = 360.0 - angle;
                assert!(landed >= won as f64 * sector + sector * 0.1 - 1e-9);
                assert!(landed <= won as f64 * sector + sector * 0.9 + 1e-9);
            }
        }
    }

    #[test]
    fn test_probability_percentages() {
        let responses = reference_table().to_responses();
        let percents: Vec<f64> = responses.iter().map(|r| r.probability_percent).collect();
        let expected = [40.0, 25.0, 15.0, 10.0, 5.0, 3.0, 2.0];
        for (got, want) in percents.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9);
        }
    }
}
