//! Rating summary and public display filtering

use serde::{Deserialize, Serialize};

use crate::review::Review;

/// Count of reviews per star rating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingDistribution {
    #[serde(rename = "5")]
    pub five: usize,
    #[serde(rename = "4")]
    pub four: usize,
    #[serde(rename = "3")]
    pub three: usize,
    #[serde(rename = "2")]
    pub two: usize,
    #[serde(rename = "1")]
    pub one: usize,
}

impl RatingDistribution {
    fn bucket_mut(&mut self, rating: u8) -> Option<&mut usize> {
        match rating {
            5 => Some(&mut self.five),
            4 => Some(&mut self.four),
            3 => Some(&mut self.three),
            2 => Some(&mut self.two),
            1 => Some(&mut self.one),
            _ => None,
        }
    }

    pub fn get(&self, rating: u8) -> usize {
        match rating {
            5 => self.five,
            4 => self.four,
            3 => self.three,
            2 => self.two,
            1 => self.one,
            _ => 0,
        }
    }
}

/// Derived summary of a set of reviews. Computed on read, never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub average_rating: f64,
    pub total_reviews: usize,
    pub distribution: RatingDistribution,
}

impl ReviewStats {
    pub fn from_reviews<'a, I>(reviews: I) -> Self
    where
        I: IntoIterator<Item = &'a Review>,
    {
        let mut distribution = RatingDistribution::default();
        let mut total = 0usize;
        let mut sum = 0u64;

        for review in reviews {
            if let Some(bucket) = distribution.bucket_mut(review.rating) {
                *bucket += 1;
                total += 1;
                sum += u64::from(review.rating);
            }
        }

        let average_rating = if total > 0 {
            sum as f64 / total as f64
        } else {
            0.0
        };

        Self {
            average_rating,
            total_reviews: total,
            distribution,
        }
    }
}

/// Sort order for the public review list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    MostRecent,
    HighestRated,
    LowestRated,
}

/// Filter and sort options for the public review list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayQuery {
    #[serde(default)]
    pub sort: SortOrder,
    /// Only reviews with exactly this rating
    #[serde(default)]
    pub rating: Option<u8>,
    /// Only reviews with at least one image
    #[serde(default)]
    pub with_photos: bool,
}

impl DisplayQuery {
    /// Filter then sort. Ties keep their input order.
    pub fn apply<'a>(&self, reviews: &'a [Review]) -> Vec<&'a Review> {
        let mut result: Vec<&Review> = reviews
            .iter()
            .filter(|r| self.rating.map_or(true, |rating| r.rating == rating))
            .filter(|r| !self.with_photos || r.has_photos())
            .collect();

        match self.sort {
            SortOrder::MostRecent => result.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOrder::HighestRated => result.sort_by(|a, b| b.rating.cmp(&a.rating)),
            SortOrder::LowestRated => result.sort_by(|a, b| a.rating.cmp(&b.rating)),
        }

        result
    }
}
