use crate::db::core::{BoardDb, LayerDirection, MAX_LAYERS};
use crate::db::indices::NetId;
use crate::db::item::Item;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoardFileError {
    #[error("failed to access board file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid board TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to encode board: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("inconsistent board: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct LayerEntry {
    name: String,
    #[serde(default = "default_direction")]
    direction: LayerDirection,
}

#[derive(Debug, Serialize, Deserialize)]
struct NetEntry {
    number: u32,
    name: String,
    #[serde(default)]
    clearance_class: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct BoardFile {
    #[serde(default = "default_clearance_classes")]
    clearance_classes: Vec<f64>,
    layers: Vec<LayerEntry>,
    #[serde(default)]
    nets: Vec<NetEntry>,
    #[serde(default)]
    items: Vec<Item>,
}

fn default_direction() -> LayerDirection {
    LayerDirection::Unknown
}

fn default_clearance_classes() -> Vec<f64> {
    vec![0.0]
}

pub fn parse_str(text: &str) -> Result<BoardDb, BoardFileError> {
    let file: BoardFile = toml::from_str(text)?;

    if file.layers.is_empty() {
        return Err(BoardFileError::Invalid("board defines no layers".to_string()));
    }

    let mut db = BoardDb::new();
    db.clearance_classes = file.clearance_classes;
    for layer in file.layers {
        if db.add_layer(layer.name.clone(), layer.direction).is_none() {
            return Err(BoardFileError::Invalid(format!(
                "layer '{}' exceeds the limit of {} layers",
                layer.name, MAX_LAYERS
            )));
        }
    }
    for net in file.nets {
        if !NetId(net.number).is_assigned() {
            return Err(BoardFileError::Invalid(format!(
                "net '{}' uses reserved number 0",
                net.name
            )));
        }
        db.add_net(NetId(net.number), net.name, net.clearance_class);
    }
    for item in file.items {
        if let Some(net) = item.nets.iter().find(|n| !db.nets.contains_key(n)) {
            return Err(BoardFileError::Invalid(format!(
                "item {:?} references undeclared net {:?}",
                item.id, net
            )));
        }
        if *item.layers().end() >= db.layer_count() {
            return Err(BoardFileError::Invalid(format!(
                "item {:?} lies on a layer the board does not have",
                item.id
            )));
        }
        if db.item(item.id).is_some() {
            return Err(BoardFileError::Invalid(format!(
                "duplicate item id {:?}",
                item.id
            )));
        }
        db.insert_item(item);
    }
    Ok(db)
}

pub fn parse(path: impl AsRef<Path>) -> Result<BoardDb, BoardFileError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| BoardFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&text)
}

pub fn to_string(db: &BoardDb) -> Result<String, BoardFileError> {
    let file = BoardFile {
        clearance_classes: db.clearance_classes.clone(),
        layers: db
            .layers
            .iter()
            .map(|l| LayerEntry {
                name: l.name.clone(),
                direction: l.direction,
            })
            .collect(),
        nets: db
            .nets
            .iter()
            .map(|(id, n)| NetEntry {
                number: id.0,
                name: n.name.clone(),
                clearance_class: n.clearance_class,
            })
            .collect(),
        items: db.items().cloned().collect(),
    };
    Ok(toml::to_string(&file)?)
}

pub fn save(db: &BoardDb, path: impl AsRef<Path>) -> Result<(), BoardFileError> {
    let path = path.as_ref();
    let text = to_string(db)?;
    std::fs::write(path, text).map_err(|source| BoardFileError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
clearance_classes = [0.0, 0.25]

[[layers]]
name = "F.Cu"
direction = "Horizontal"

[[layers]]
name = "B.Cu"
direction = "Vertical"

[[nets]]
number = 1
name = "GND"

[[nets]]
number = 2
name = "CLK"
clearance_class = 1

[[items]]
id = 1
nets = [1]
kind = "pin"
center = { x = 0.0, y = 0.0 }
first_layer = 0
last_layer = 1

[[items]]
id = 2
nets = [1]
kind = "pin"
center = { x = 10.0, y = 0.0 }
first_layer = 0
last_layer = 1

[[items]]
id = 7
nets = [2]
kind = "conduction_area"
area = { min = { x = 0.0, y = 5.0 }, max = { x = 10.0, y = 9.0 } }
layer = 1
"#;

    #[test]
    fn test_parse_sample_board() {
        let db = parse_str(SAMPLE).unwrap();
        assert_eq!(db.layer_count(), 2);
        assert_eq!(db.num_nets(), 2);
        assert_eq!(db.num_items(), 3);
        assert!(db.contains_plane(NetId(2)));
        assert!(!db.contains_plane(NetId(1)));
        assert_eq!(db.clearance(1), 0.25);
    }

    #[test]
    fn test_undeclared_net_is_rejected() {
        let text = SAMPLE.replace("nets = [2]", "nets = [5]");
        let err = parse_str(&text).unwrap_err();
        assert!(matches!(err, BoardFileError::Invalid(_)));
    }

    #[test]
    fn test_too_many_layers_are_rejected() {
        let mut text = String::new();
        for i in 0..=MAX_LAYERS {
            text.push_str(&format!("[[layers]]\nname = \"L{}\"\ndirection = \"Unknown\"\n\n", i));
        }
        match parse_str(&text) {
            Err(BoardFileError::Invalid(msg)) => assert!(msg.contains(&format!("L{}", MAX_LAYERS))),
            other => panic!("expected invalid board, got {:?}", other.map(|db| db.layer_count())),
        }
    }

    #[test]
    fn test_save_and_reload_through_file() {
        let db = parse_str(SAMPLE).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.toml");
        save(&db, &path).unwrap();
        let reloaded = parse(&path).unwrap();
        assert_eq!(reloaded.fingerprint(), db.fingerprint());
        assert_eq!(reloaded.nets[&NetId(2)].clearance_class, 1);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = parse("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("here.toml"));
    }
}
