//! Default issue date text, in the long Brazilian Portuguese form.

use chrono::{Datelike, Local, NaiveDate};

const MONTHS_PT_BR: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

/// `"<day> de <Month> de <year>"`, e.g. "5 de Março de 2024".
pub fn format_pt_br(date: NaiveDate) -> String {
    let month = MONTHS_PT_BR[date.month0() as usize];
    format!("{} de {} de {}", date.day(), month, date.year())
}

pub fn today_pt_br() -> String {
    format_pt_br(Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pt_br() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(format_pt_br(date), "15 de Março de 2024");
    }

    #[test]
    fn test_day_is_not_padded() {
        let date = NaiveDate::from_ymd_opt(2023, 11, 5).unwrap();
        assert_eq!(format_pt_br(date), "5 de Novembro de 2023");
    }

    #[test]
    fn test_every_month_is_capitalized() {
        for month in 1..=12 {
            let date = NaiveDate::from_ymd_opt(2024, month, 1).unwrap();
            let text = format_pt_br(date);
            let name = text.split(' ').nth(2).unwrap();
            assert!(name.chars().next().unwrap().is_uppercase(), "{}", text);
        }
    }

    #[test]
    fn test_today_has_three_parts() {
        let text = today_pt_br();
        assert_eq!(text.split(" de ").count(), 3);
    }
}
