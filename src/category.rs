//! Closed category taxonomy and auto-assignment
//!
//! Categories form a fixed set; "Otros" is allowed only when no better
//! mapping exists. Assignment order: known merchant → concept keywords →
//! default bucket. The state machine persists whatever label the caller
//! computed here; it never categorizes on its own.

/// Essential spending
pub const ESSENTIAL: &[&str] = &[
    "Alimentación",
    "Supermercado",
    "Transporte",
    "Servicios",
    "Salud",
    "Vivienda",
    "Educación",
];

/// Discretionary spending
pub const DISCRETIONARY: &[&str] = &[
    "Restaurantes",
    "Entretenimiento",
    "Compras",
    "Conveniencia",
    "Viajes",
    "Suscripciones",
    "Cuidado Personal",
];

/// Financial movements (non-consumption)
pub const FINANCIAL_MOVEMENT: &[&str] = &[
    "Nómina",
    "Ingresos Extra",
    "Préstamos",
    "Transferencias",
    "Ahorro",
];

/// Last-resort bucket
pub const DEFAULT_CATEGORY: &str = "Otros";

/// Known-merchant table — static, zero allocation
const KNOWN_MERCHANTS: &[(&str, &str)] = &[
    ("la trattoria", "Restaurantes"),
    ("pizza hut", "Restaurantes"),
    ("starbucks", "Alimentación"),
    ("mcdonald's", "Alimentación"),
    ("kfc", "Alimentación"),
    ("walmart", "Supermercado"),
    ("soriana", "Supermercado"),
    ("chedraui", "Supermercado"),
    ("oxxo", "Conveniencia"),
    ("7-eleven", "Conveniencia"),
    ("uber", "Transporte"),
    ("didi", "Transporte"),
    ("cabify", "Transporte"),
    ("netflix", "Suscripciones"),
    ("spotify", "Suscripciones"),
    ("steam", "Entretenimiento"),
    ("cinépolis", "Entretenimiento"),
    ("amazon", "Compras"),
    ("mercado libre", "Compras"),
    ("liverpool", "Compras"),
    ("cfe", "Servicios"),
    ("telmex", "Servicios"),
    ("telcel", "Servicios"),
    ("aeroméxico", "Viajes"),
    ("farmacia guadalajara", "Salud"),
    ("farmacias del ahorro", "Salud"),
];

/// Concept keyword fallback, scanned when the merchant is unknown
const CONCEPT_KEYWORDS: &[(&str, &str)] = &[
    ("cena", "Restaurantes"),
    ("dinner", "Restaurantes"),
    ("tacos", "Restaurantes"),
    ("restaurante", "Restaurantes"),
    ("almuerzo", "Restaurantes"),
    ("desayuno", "Alimentación"),
    ("comida", "Alimentación"),
    ("café", "Alimentación"),
    ("coffee", "Alimentación"),
    ("super", "Supermercado"),
    ("despensa", "Supermercado"),
    ("groceries", "Supermercado"),
    ("gasolina", "Transporte"),
    ("taxi", "Transporte"),
    ("uber", "Transporte"),
    ("metro", "Transporte"),
    ("camión", "Transporte"),
    ("vuelo", "Viajes"),
    ("hotel", "Viajes"),
    ("cine", "Entretenimiento"),
    ("concierto", "Entretenimiento"),
    ("videojuego", "Entretenimiento"),
    ("ropa", "Compras"),
    ("zapatos", "Compras"),
    ("luz", "Servicios"),
    ("agua", "Servicios"),
    ("internet", "Servicios"),
    ("teléfono", "Servicios"),
    ("renta", "Vivienda"),
    ("rent", "Vivienda"),
    ("hipoteca", "Vivienda"),
    ("medicina", "Salud"),
    ("doctor", "Salud"),
    ("farmacia", "Salud"),
    ("dentista", "Salud"),
    ("colegiatura", "Educación"),
    ("escuela", "Educación"),
    ("curso", "Educación"),
    ("libro", "Educación"),
    ("nómina", "Nómina"),
    ("sueldo", "Nómina"),
    ("salario", "Nómina"),
    ("salary", "Nómina"),
    ("préstamo", "Préstamos"),
    ("transferencia", "Transferencias"),
    ("ahorro", "Ahorro"),
];

/// Whether a label belongs to the closed taxonomy
pub fn is_known_label(label: &str) -> bool {
    label == DEFAULT_CATEGORY
        || ESSENTIAL.contains(&label)
        || DISCRETIONARY.contains(&label)
        || FINANCIAL_MOVEMENT.contains(&label)
}

/// Suggest a category for a transaction.
///
/// Merchant match wins over concept keywords; "Otros" only when neither
/// yields a mapping.
pub fn suggest(concept: &str, merchant: Option<&str>) -> &'static str {
    if let Some(m) = merchant {
        let m = m.trim().to_lowercase();
        if let Some((_, label)) = KNOWN_MERCHANTS.iter().find(|(known, _)| *known == m) {
            return label;
        }
    }

    let concept = concept.to_lowercase();
    for (keyword, label) in CONCEPT_KEYWORDS {
        if concept.contains(keyword) {
            return label;
        }
    }

    DEFAULT_CATEGORY
}
