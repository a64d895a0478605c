use rand::Rng;

/// Maximum time bonus for instant answers (20%).
pub const MAX_TIME_BONUS: f64 = 0.2;

/// Maximum nickname length after trimming.
pub const MAX_NICKNAME_LEN: usize = 100;

/// Bonus multiplier in `[0, MAX_TIME_BONUS]` for answering with time to
/// spare. Zero or negative latency counts as instant; answering at or past
/// the limit earns no bonus.
pub fn calculate_time_bonus(response_time: f64, time_limit: u32) -> f64 {
    let time_limit = time_limit.max(1) as f64;
    if response_time >= time_limit {
        return 0.0;
    }

    let remaining = time_limit - response_time;
    let time_ratio = (remaining / time_limit).min(1.0);
    (time_ratio * MAX_TIME_BONUS).min(MAX_TIME_BONUS)
}

/// Final points for an answer: 0 when incorrect, base points when no
/// latency was reported, otherwise `floor(base * (1 + bonus))`.
pub fn calculate_score(
    base_points: u32,
    is_correct: bool,
    response_time: Option<f64>,
    time_limit: u32,
) -> u32 {
    if !is_correct {
        return 0;
    }

    match response_time {
        None => base_points,
        Some(rt) => {
            let bonus = calculate_time_bonus(rt, time_limit);
            (base_points as f64 * (1.0 + bonus)).floor() as u32
        }
    }
}

/// Trim, cap, and default a player nickname.
pub fn sanitize_nickname(nickname: &str) -> String {
    let mut nickname: String = nickname.trim().chars().take(MAX_NICKNAME_LEN).collect();

    if nickname.is_empty() {
        let mut rng = rand::thread_rng();
        nickname = format!("Player{}", rng.gen_range(1000..10000));
    }

    nickname
}

/// Random room code: uppercase letters and digits, human-enterable.
pub fn generate_room_code(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_answer_gets_full_bonus() {
        assert_eq!(calculate_score(100, true, Some(0.0), 30), 120);
    }

    #[test]
    fn test_negative_latency_treated_as_instant() {
        assert_eq!(calculate_score(100, true, Some(-3.0), 30), 120);
    }

    #[test]
    fn test_answer_at_limit_gets_base_points() {
        assert_eq!(calculate_score(100, true, Some(30.0), 30), 100);
    }

    #[test]
    fn test_late_answer_still_scores_base_points() {
        assert_eq!(calculate_score(100, true, Some(45.0), 30), 100);
    }

    #[test]
    fn test_incorrect_answer_scores_zero() {
        assert_eq!(calculate_score(100, false, Some(0.0), 30), 0);
        assert_eq!(calculate_score(100, false, None, 30), 0);
    }

    #[test]
    fn test_no_latency_awards_base_points() {
        assert_eq!(calculate_score(100, true, None, 30), 100);
    }

    #[test]
    fn test_halfway_answer_bonus() {
        // 15s remaining of 30s: ratio 0.5, bonus 0.1, floor(100 * 1.1) = 110
        assert_eq!(calculate_score(100, true, Some(15.0), 30), 110);
    }

    #[test]
    fn test_bonus_is_floored() {
        // 10s remaining of 30s: bonus = 1/3 * 0.2 = 0.0666..., 55 * 1.0666 = 58.666
        assert_eq!(calculate_score(55, true, Some(20.0), 30), 58);
    }

    #[test]
    fn test_sanitize_trims_and_caps() {
        assert_eq!(sanitize_nickname("  Ada  "), "Ada");

        let long = "x".repeat(250);
        assert_eq!(sanitize_nickname(&long).len(), MAX_NICKNAME_LEN);
    }

    #[test]
    fn test_sanitize_defaults_empty() {
        let name = sanitize_nickname("   ");
        assert!(name.starts_with("Player"));
        assert!(name.len() > "Player".len());
    }

    #[test]
    fn test_room_code_shape() {
        let code = generate_room_code(6);
        assert_eq!(code.len(), 6);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
