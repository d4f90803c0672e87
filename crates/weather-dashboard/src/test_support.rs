use crate::model::{
    Coordinates, CurrentConditions, ForecastPoint, ForecastProvenance, ForecastSeries,
    LocationMeta, TemperatureBlock, WeatherCondition, WeatherSnapshot, Wind,
};

pub(crate) fn sample_snapshot() -> WeatherSnapshot {
    let condition = WeatherCondition {
        id: 803,
        main: "Clouds".to_string(),
        description: "broken clouds".to_string(),
        icon: "04d".to_string(),
    };
    let main = TemperatureBlock {
        temp: 12.3,
        feels_like: 11.1,
        temp_min: 10.9,
        temp_max: 13.8,
        pressure: 1012.0,
        humidity: 81.0,
    };
    let wind = Wind {
        speed: 4.6,
        deg: 230.0,
    };

    WeatherSnapshot {
        current: CurrentConditions {
            coord: Coordinates {
                lat: 51.5074,
                lon: -0.1278,
            },
            weather: vec![condition.clone()],
            main: main.clone(),
            visibility: 10_000.0,
            wind,
            clouds: 75.0,
            dt: 1_770_811_200,
            location: LocationMeta {
                name: "London".to_string(),
                country: "GB".to_string(),
                sunrise: 1_770_794_100,
                sunset: 1_770_829_800,
                timezone_offset: 0,
            },
        },
        forecast: ForecastSeries {
            provenance: ForecastProvenance::Native,
            points: vec![ForecastPoint {
                dt: 1_770_822_000,
                main,
                weather: vec![condition],
                wind,
                clouds: 90.0,
                visibility: 9_000.0,
                pop: 0.64,
            }],
        },
    }
}
