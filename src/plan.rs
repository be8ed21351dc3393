//! plan — каскадный планировщик.
//!
//! Снапшот более длинного яруса обнуляет базовые линии всех более коротких:
//! после base устаревают yearly..daily, после monthly — weekly и daily.
//! Поэтому запуск яруса R всегда немедленно перестраивает и все ярусы короче R,
//! в фиксированном порядке — иначе короткие архивы ссылались бы на устаревшую базу.

use crate::interval::Interval;

/// Упорядоченный список ярусов для одного запуска: сам R, затем все ярусы
/// строго короче R. cascade(daily) == [daily]; cascade(base) — все пять.
pub fn cascade(requested: Interval) -> Vec<Interval> {
    Interval::ALL
        .into_iter()
        .filter(|iv| *iv >= requested)
        .collect()
}
