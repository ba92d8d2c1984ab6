//! Static lookup tables that turn raw model output into response fields.

use crate::model_service::ClassLabel;

/// Crop classifier classes, in label-encoder order.
pub const CROP_LABELS: [&str; 22] = [
    "apple",
    "banana",
    "blackgram",
    "chickpea",
    "coconut",
    "coffee",
    "cotton",
    "grapes",
    "jute",
    "kidneybeans",
    "lentil",
    "maize",
    "mango",
    "mothbeans",
    "mungbean",
    "muskmelon",
    "orange",
    "papaya",
    "pigeonpeas",
    "pomegranate",
    "rice",
    "watermelon",
];

pub const SOIL_TYPES: [&str; 5] = ["Sandy", "Loamy", "Clay", "Red", "Black"];

pub const CROP_TYPES: [&str; 8] = [
    "Rice",
    "Wheat",
    "Cotton",
    "Maize",
    "Sugarcane",
    "Pulses",
    "Barley",
    "Millets",
];

/// Code used for categorical values outside the enumeration.
pub const UNKNOWN_CATEGORY: i64 = -1;

pub const CROP_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1592408666037-3eb5a5d01567?w=500&h=300&fit=crop";
pub const FERTILIZER_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1586773860418-d37222d8fce3?w=500&h=300&fit=crop";
pub const FERTILIZER_DESCRIPTION: &str =
    "This balanced fertilizer is ideal for your soil conditions and crop type.";

/// Disease CNN classes, in model output order.
pub const DISEASE_CLASS_NAMES: [&str; 15] = [
    "Blueberry___healthy",
    "Cherry_(including_sour)___Powdery_mildew",
    "Cherry_(including_sour)___healthy",
    "Corn_(maize)___Cercospora_leaf_spot Gray_leaf_spot",
    "Corn_(maize)___Common_rust_",
    "Corn_(maize)___healthy",
    "Corn_(maize)___Northern_Leaf_Blight",
    "Grape___Black_rot",
    "Grape___Esca_(Black_Measles)",
    "Grape___healthy",
    "Grape___Leaf_blight_(Isariopsis_Leaf_Spot)",
    "Orange___Haunglongbing_(Citrus_greening)",
    "Peach___Bacterial_spot",
    "Peach___healthy",
    "Pepper,_bell___Bacterial_spot",
];

const HEALTHY: &[&str] = &["Your plant is healthy. Keep up the good work!"];
const NO_REMEDY: &[&str] = &["No specific remedy found."];
const UNKNOWN_REMEDY: &[&str] = &["Cannot determine remedy for unknown class."];

fn remedies_for(class_name: &str) -> &'static [&'static str] {
    match class_name {
        "Blueberry___healthy"
        | "Cherry_(including_sour)___healthy"
        | "Corn_(maize)___healthy"
        | "Grape___healthy"
        | "Peach___healthy" => HEALTHY,
        "Cherry_(including_sour)___Powdery_mildew" => &[
            "Apply fungicides like sulfur, potassium bicarbonate, or neem oil.",
            "Prune affected areas to improve air circulation.",
        ],
        "Corn_(maize)___Cercospora_leaf_spot Gray_leaf_spot" => &[
            "Use resistant hybrids.",
            "Practice crop rotation.",
            "Apply fungicides when necessary.",
        ],
        "Corn_(maize)___Common_rust_" => &[
            "Plant resistant varieties.",
            "Apply fungicides at the first sign of disease.",
        ],
        "Corn_(maize)___Northern_Leaf_Blight" => &[
            "Use resistant hybrids.",
            "Practice tillage to bury crop residue.",
            "Apply fungicides.",
        ],
        "Grape___Black_rot" => &[
            "Remove and destroy infected canes, leaves, and fruit.",
            "Apply fungicides during the growing season.",
        ],
        "Grape___Esca_(Black_Measles)" => &[
            "Prune out dead or dying arms.",
            "There is no effective chemical control.",
        ],
        "Grape___Leaf_blight_(Isariopsis_Leaf_Spot)" => &[
            "Remove and destroy infected leaves.",
            "Apply fungicides if the disease is severe.",
        ],
        "Orange___Haunglongbing_(Citrus_greening)" => &[
            "Remove infected trees.",
            "Control psyllid populations with insecticides.",
        ],
        "Peach___Bacterial_spot" => &[
            "Use resistant varieties.",
            "Apply copper-based bactericides.",
        ],
        "Pepper,_bell___Bacterial_spot" => &[
            "Use disease-free seed.",
            "Rotate crops.",
            "Apply copper-based bactericides.",
        ],
        _ => NO_REMEDY,
    }
}

/// Position of `value` in `table`, or [`UNKNOWN_CATEGORY`].
pub fn encode_category(value: &str, table: &[&str]) -> i64 {
    table
        .iter()
        .position(|entry| *entry == value)
        .map(|index| index as i64)
        .unwrap_or(UNKNOWN_CATEGORY)
}

/// Human-readable crop name for a classifier label. Integer labels index
/// [`CROP_LABELS`]; `None` when the index falls outside it.
pub fn crop_name(label: &ClassLabel) -> Option<String> {
    match label {
        ClassLabel::Name(name) => Some(name.clone()),
        ClassLabel::Index(index) => usize::try_from(*index)
            .ok()
            .and_then(|i| CROP_LABELS.get(i))
            .map(|name| name.to_string()),
    }
}

pub fn fertilizer_name(label: &ClassLabel) -> String {
    match label {
        ClassLabel::Name(name) => name.clone(),
        ClassLabel::Index(index) => index.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnosis {
    pub class_name: String,
    pub remedies: Vec<String>,
}

impl Diagnosis {
    pub fn display_name(&self) -> String {
        display_disease_name(&self.class_name)
    }
}

/// Maps a predicted class index to its class name and remedies. Indices the
/// table does not know become an "Unknown Class" diagnosis.
pub fn diagnose(index: usize) -> Diagnosis {
    match DISEASE_CLASS_NAMES.get(index) {
        Some(class_name) => Diagnosis {
            class_name: class_name.to_string(),
            remedies: to_owned(remedies_for(class_name)),
        },
        None => Diagnosis {
            class_name: format!("Unknown Class (index: {})", index),
            remedies: to_owned(UNKNOWN_REMEDY),
        },
    }
}

pub fn display_disease_name(class_name: &str) -> String {
    class_name.replace("___", " - ").replace('_', " ")
}

fn to_owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
