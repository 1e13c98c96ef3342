//! Series schema registry.
//!
//! Each known series is one static entry: adding a series means adding an
//! entry here, never touching the pipeline stages.

use crate::normalize::fold;

/// How a measure recognises its source column, compared on folded names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnAlias {
    /// The whole column name
    Exact(&'static str),
    /// Any word of the column name starting with this prefix
    Word(&'static str),
}

impl ColumnAlias {
    pub fn matches(&self, folded_column: &str) -> bool {
        match self {
            ColumnAlias::Exact(name) => folded_column == *name,
            ColumnAlias::Word(prefix) => words(folded_column).any(|w| w.starts_with(prefix)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasureSpec {
    /// Output column name
    pub name: &'static str,
    /// Tried in order; earlier aliases win over later ones
    pub aliases: &'static [ColumnAlias],
    /// Columns containing any of these words are never claimed
    pub excludes: &'static [&'static str],
}

impl MeasureSpec {
    pub fn is_excluded(&self, folded_column: &str) -> bool {
        self.excludes
            .iter()
            .any(|ex| words(folded_column).any(|w| w.starts_with(ex)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesSchema {
    pub id: &'static str,
    pub description: &'static str,
    /// Output file is `series_<stem>.csv`
    pub stem: &'static str,
    /// Index chapter the source file is published under
    pub chapter_prefix: &'static str,
    /// Header words that identify the period column's header row
    pub anchor_labels: &'static [&'static str],
    pub period_aliases: &'static [&'static str],
    pub year_aliases: &'static [&'static str],
    /// Sheet/table name keywords, highest priority first
    pub selection_keywords: &'static [&'static str],
    pub measures: &'static [MeasureSpec],
    /// Measures that must be matched for the table to be accepted
    pub required: &'static [&'static str],
}

impl SeriesSchema {
    pub fn measure_names(&self) -> Vec<&'static str> {
        self.measures.iter().map(|m| m.name).collect()
    }

    pub fn file_name(&self) -> String {
        format!("series_{}.csv", self.stem)
    }

    /// True when `folded_column` has one of `aliases` as a whole word
    pub fn has_alias(aliases: &[&str], folded_column: &str) -> bool {
        words(folded_column).any(|w| aliases.contains(&w))
    }
}

fn words(folded: &str) -> impl Iterator<Item = &str> {
    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
}

const ANCHORS: &[&str] = &["fecha", "mes", "periodo"];
const YEAR_ALIASES: &[&str] = &["ano", "anio", "year"];

const fn measure(name: &'static str, aliases: &'static [ColumnAlias]) -> MeasureSpec {
    MeasureSpec {
        name,
        aliases,
        excludes: &[],
    }
}

use ColumnAlias::{Exact, Word};

pub static REGISTRY: &[SeriesSchema] = &[
    SeriesSchema {
        id: "desempleo",
        description: "III.3 Subsidio por desempleo (cuadro general)",
        stem: "desempleo",
        chapter_prefix: "III.3",
        anchor_labels: ANCHORS,
        period_aliases: ANCHORS,
        year_aliases: YEAR_ALIASES,
        selection_keywords: &["emision", "altas", "promedio"],
        measures: &[
            measure("beneficiarios", &[Word("beneficiari")]),
            measure("altas", &[Word("alta")]),
            measure("bajas", &[Word("baja")]),
            MeasureSpec {
                name: "monto_total",
                aliases: &[Word("monto"), Word("importe"), Exact("total")],
                excludes: &["promedio"],
            },
        ],
        required: &[],
    },
    SeriesSchema {
        id: "desempleo-altas",
        description: "III.3 Subsidio por desempleo: altas por zona y causal",
        stem: "desempleo_altas",
        chapter_prefix: "III.3",
        anchor_labels: ANCHORS,
        period_aliases: ANCHORS,
        year_aliases: YEAR_ALIASES,
        selection_keywords: &["altas"],
        measures: &[
            measure("altas", &[Exact("total"), Exact("altas")]),
            measure("altas_montevideo", &[Word("montevideo")]),
            measure("altas_interior", &[Word("interior")]),
            measure("altas_despido", &[Word("despido")]),
            measure("altas_suspension", &[Word("suspension")]),
            measure("altas_fin_contrato", &[Word("contrato")]),
        ],
        required: &[],
    },
    SeriesSchema {
        id: "desempleo-emision",
        description: "III.3 Subsidio por desempleo: emisión (beneficiarios)",
        stem: "desempleo_emision",
        chapter_prefix: "III.3",
        anchor_labels: ANCHORS,
        period_aliases: ANCHORS,
        year_aliases: YEAR_ALIASES,
        selection_keywords: &["emision"],
        measures: &[
            measure("beneficiarios", &[Exact("total"), Word("beneficiari")]),
            measure("altas", &[Word("alta")]),
            measure("bajas", &[Word("baja")]),
        ],
        required: &[],
    },
    SeriesSchema {
        id: "desempleo-promedio",
        description: "III.3 Subsidio por desempleo: importe promedio",
        stem: "desempleo_promedio",
        chapter_prefix: "III.3",
        anchor_labels: ANCHORS,
        period_aliases: ANCHORS,
        year_aliases: YEAR_ALIASES,
        selection_keywords: &["promedio"],
        measures: &[
            measure("importe_promedio_montevideo", &[Word("montevideo")]),
            measure("importe_promedio_interior", &[Word("interior")]),
            measure("importe_promedio_total", &[Word("total")]),
        ],
        required: &[],
    },
    SeriesSchema {
        id: "recaudacion",
        description: "II Recaudación: privados, públicos y total",
        stem: "recaudacion",
        chapter_prefix: "II",
        anchor_labels: ANCHORS,
        period_aliases: ANCHORS,
        year_aliases: YEAR_ALIASES,
        selection_keywords: &["recaudacion", "total"],
        measures: &[
            measure("recaudacion_privados", &[Word("privado")]),
            measure("recaudacion_publicos", &[Word("publico")]),
            measure("recaudacion_total", &[Word("total")]),
        ],
        required: &[
            "recaudacion_privados",
            "recaudacion_publicos",
            "recaudacion_total",
        ],
    },
];

/// Find a schema by identifier, ignoring case and accents
pub fn lookup(id: &str) -> Option<&'static SeriesSchema> {
    let wanted = fold(id);
    REGISTRY.iter().find(|schema| schema.id == wanted)
}

pub fn all() -> &'static [SeriesSchema] {
    REGISTRY
}
