use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;

pub const CHALLENGES: [&str; 10] = [
    "Recomienda una película que casi nadie haya visto #recomendacion",
    "Escribe una crítica de al menos 25 palabras de lo último que viste #critica",
    "Comparte un documental que te haya cambiado la forma de pensar #documental",
    "Abre un debate: ¿el libro siempre es mejor que la película? #debate",
    "Cuenta un dato curioso sobre el rodaje de un clásico #trivia",
    "Reseña una serie que terminaste esta semana #resena",
    "Recomienda un anime para alguien que nunca ha visto uno #anime",
    "Elige la mejor banda sonora de la década y explica por qué #aporte",
    "Comparte la película que más veces has vuelto a ver #pelicula",
    "Defiende una serie cancelada antes de tiempo #serie",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyChallenge {
    pub date: NaiveDate,
    pub prompt: &'static str,
}

/// Same date, same challenge; consecutive dates walk the list in order.
pub fn challenge_for(date: NaiveDate) -> DailyChallenge {
    let len = CHALLENGES.len() as i32;
    let idx = date.num_days_from_ce().rem_euclid(len) as usize;

    DailyChallenge {
        date,
        prompt: CHALLENGES[idx],
    }
}

pub fn today() -> DailyChallenge {
    challenge_for(Utc::now().date_naive())
}

#[cfg(test)]
mod test {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_challenge_is_deterministic() {
        let day = date(2025, 3, 14);
        assert_eq!(challenge_for(day), challenge_for(day));
    }

    #[test]
    fn test_consecutive_days_rotate() {
        let day = date(2025, 3, 14);
        let idx = day.num_days_from_ce() as usize % CHALLENGES.len();
        let next = day.succ_opt().unwrap();

        assert_eq!(challenge_for(day).prompt, CHALLENGES[idx]);
        assert_eq!(
            challenge_for(next).prompt,
            CHALLENGES[(idx + 1) % CHALLENGES.len()]
        );
    }

    #[test]
    fn test_cycle_repeats_after_list_length() {
        let day = date(2024, 12, 31);
        let later = day + chrono::Days::new(CHALLENGES.len() as u64);

        assert_eq!(challenge_for(day).prompt, challenge_for(later).prompt);
    }
}
