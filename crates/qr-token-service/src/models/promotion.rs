//! 促销实体定义
//!
//! 促销记录由外部的促销管理服务维护，本服务只读。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 促销活动
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: Uuid,
    /// 促销名称
    pub title: String,
    /// 促销描述
    #[sqlx(default)]
    pub description: Option<String>,
    /// 核销奖励积分（正整数）
    pub points: i32,
    /// 归属学校（null 为全局促销）
    #[sqlx(default)]
    pub school_id: Option<Uuid>,
    /// 生效开始时间（null 为不限）
    #[sqlx(default)]
    pub starts_at: Option<DateTime<Utc>>,
    /// 生效结束时间（null 为不限）
    #[sqlx(default)]
    pub ends_at: Option<DateTime<Utc>>,
    /// 单用户核销上限（null 为不限）
    #[sqlx(default)]
    pub per_user_cap: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Promotion {
    /// 检查促销是否在有效窗口内
    ///
    /// 开始时间含边界，结束时间不含边界（now >= ends_at 视为已结束）。
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        let after_start = self.starts_at.is_none_or(|t| now >= t);
        let before_end = self.ends_at.is_none_or(|t| now < t);
        after_start && before_end
    }

    /// 窗口外时给出具体原因
    pub fn inactive_reason(&self, now: DateTime<Utc>) -> Option<&'static str> {
        if let Some(starts_at) = self.starts_at
            && now < starts_at
        {
            return Some("promotion has not started yet");
        }
        if let Some(ends_at) = self.ends_at
            && now >= ends_at
        {
            return Some("promotion has ended");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_promotion() -> Promotion {
        Promotion {
            id: Uuid::new_v4(),
            title: "2x1 en Cafetería".to_string(),
            description: None,
            points: 50,
            school_id: None,
            starts_at: None,
            ends_at: None,
            per_user_cap: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_unbounded_window_is_always_active() {
        let promotion = create_test_promotion();
        assert!(promotion.is_active(Utc::now()));
        assert_eq!(promotion.inactive_reason(Utc::now()), None);
    }

    #[test]
    fn test_future_start_is_inactive() {
        let now = Utc::now();
        let mut promotion = create_test_promotion();
        promotion.starts_at = Some(now + Duration::hours(1));

        assert!(!promotion.is_active(now));
        assert_eq!(
            promotion.inactive_reason(now),
            Some("promotion has not started yet")
        );
    }

    #[test]
    fn test_past_end_is_inactive() {
        let now = Utc::now();
        let mut promotion = create_test_promotion();
        promotion.ends_at = Some(now - Duration::hours(1));

        assert!(!promotion.is_active(now));
        assert_eq!(promotion.inactive_reason(now), Some("promotion has ended"));
    }

    #[test]
    fn test_end_boundary_is_exclusive() {
        let now = Utc::now();
        let mut promotion = create_test_promotion();
        promotion.ends_at = Some(now);

        // now == ends_at 视为已结束
        assert!(!promotion.is_active(now));
    }

    #[test]
    fn test_start_boundary_is_inclusive() {
        let now = Utc::now();
        let mut promotion = create_test_promotion();
        promotion.starts_at = Some(now);

        assert!(promotion.is_active(now));
    }
}
