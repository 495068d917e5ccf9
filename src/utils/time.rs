use chrono::{NaiveDate, NaiveTime, Utc};

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Hourly grid from `start_hour` to `end_hour`, both inclusive.
pub fn hourly_grid(start_hour: u32, end_hour: u32) -> Vec<NaiveTime> {
    (start_hour..=end_hour)
        .filter_map(|h| NaiveTime::from_hms_opt(h, 0, 0))
        .collect()
}

pub fn format_slot(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_is_inclusive() {
        let grid = hourly_grid(9, 18);
        assert_eq!(grid.len(), 10);
        assert_eq!(format_slot(grid[0]), "09:00");
        assert_eq!(format_slot(grid[9]), "18:00");
    }
}
