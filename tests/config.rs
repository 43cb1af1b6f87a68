use shader_tilemap::buffer_pool::DEFAULT_IDLE_MS;
use shader_tilemap::config::TilemapConfig;

#[test]
fn test_defaults() {
    let config = TilemapConfig::default();
    assert_eq!((config.tile_width, config.tile_height), (48, 48));
    assert_eq!((config.width, config.height), (816, 624));
    assert_eq!(config.margin, 20);
    assert!(config.square_shader);
    assert_eq!(config.buffer_idle_ms, DEFAULT_IDLE_MS);
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config = TilemapConfig::from_json(r#"{ "tile_width": 32, "square_shader": false }"#).unwrap();
    assert_eq!(config.tile_width, 32);
    assert!(!config.square_shader);
    assert_eq!(config.tile_height, 48);
    assert_eq!(config.shadow_color, [0.0, 0.0, 0.0, 0.5]);

    assert_eq!(TilemapConfig::from_json("{}").unwrap(), TilemapConfig::default());
}

#[test]
fn test_invalid_json_is_an_error() {
    assert!(TilemapConfig::from_json("{ tile_width: 32 }").is_err());
    assert!(TilemapConfig::from_json(r#"{ "margin": -1 }"#).is_err());
}

#[test]
fn test_json_survives_a_save() {
    let config = TilemapConfig { margin: 0, animation_interval: 12, ..TilemapConfig::default() };
    let json = config.to_json().unwrap();
    assert_eq!(TilemapConfig::from_json(&json).unwrap(), config);
}
