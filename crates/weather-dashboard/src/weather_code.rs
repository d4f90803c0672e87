use crate::model::WeatherCondition;

/// Category for a code in the OpenWeather numeric space.
pub fn category(code: i32) -> &'static str {
    match code {
        200..=299 => "Thunderstorm",
        300..=399 => "Drizzle",
        500..=599 => "Rain",
        600..=699 => "Snow",
        700..=799 => "Atmosphere",
        800 => "Clear",
        801.. => "Clouds",
        _ => "Unknown",
    }
}

pub fn icon(code: i32, is_day: bool) -> String {
    let base = match code {
        200..=299 => "11",
        300..=399 => "09",
        500..=599 => "10",
        600..=699 => "13",
        700..=799 => "50",
        801 | 802 => "02",
        803 => "03",
        804.. => "04",
        _ => "01",
    };
    let suffix = if is_day { 'd' } else { 'n' };
    format!("{base}{suffix}")
}

/// Builds the canonical condition quad; a blank description falls back to the category.
pub fn condition(code: i32, description: Option<&str>, is_day: bool) -> WeatherCondition {
    let main = category(code);
    let description = description
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(main)
        .to_string();

    WeatherCondition {
        id: code,
        main: main.to_string(),
        description,
        icon: icon(code, is_day),
    }
}

/// Translates a Weatherstack condition code into the OpenWeather numeric space.
pub fn from_weatherstack(code: i32) -> Option<i32> {
    let translated = match code {
        113 => 800,
        116 => 802,
        119 => 803,
        122 => 804,
        143 => 701,
        248 | 260 => 741,
        176 | 293 | 296 => 500,
        299 | 302 => 501,
        305 | 308 => 502,
        311 | 314 => 511,
        353 => 520,
        356 => 521,
        359 => 522,
        263 | 266 => 300,
        185 | 281 => 301,
        284 => 302,
        179 | 323 | 326 => 600,
        227 | 329 | 332 => 601,
        230 | 335 | 338 => 602,
        182 | 317 | 320 | 350 => 611,
        362 | 374 => 612,
        365 | 377 => 613,
        368 => 620,
        371 => 621,
        200 => 210,
        386 => 200,
        389 => 201,
        392 => 230,
        395 => 232,
        _ => return None,
    };
    Some(translated)
}
