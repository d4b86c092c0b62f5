use crate::domain::model::ThesisDocument;
use crate::domain::ports::{ArchiveStore, Embedder};
use crate::domain::services::embedding_text;
use crate::utils::error::Result;
use chrono::Utc;

pub struct Statute {
    pub registro: &'static str,
    pub rubro: &'static str,
    pub texto: &'static str,
    pub epoca: &'static str,
    pub materia: &'static str,
}

/// Statutory provisions kept in the archive next to the case-law theses.
pub const FUNDAMENTAL_LAWS: &[Statute] = &[
    Statute {
        registro: "L-CFF-38",
        rubro: "CFF ARTÍCULO 38 - REQUISITOS DE LOS ACTOS ADMINISTRATIVOS",
        texto: "Los actos administrativos que se deban notificar deberán contener...",
        epoca: "LEY VIGENTE",
        materia: "FISCAL",
    },
    Statute {
        registro: "L-CFF-42",
        rubro: "CFF ARTÍCULO 42 - FACULTADES DE COMPROBACIÓN",
        texto: "Las autoridades fiscales a fin de comprobar...",
        epoca: "LEY VIGENTE",
        materia: "FISCAL",
    },
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LawsReport {
    pub loaded: usize,
    pub already_present: usize,
    pub failed: usize,
}

/// Embeds and archives each statute not yet processed.
///
/// An embedding failure skips that statute; store errors abort.
pub async fn load_fundamental_laws<A, E>(archive: &A, embedder: &E) -> Result<LawsReport>
where
    A: ArchiveStore + ?Sized,
    E: Embedder + ?Sized,
{
    tracing::info!("⚖️ Loading fundamental laws...");
    let mut report = LawsReport::default();

    for law in FUNDAMENTAL_LAWS {
        if archive.is_processed(law.registro).await? {
            tracing::info!("⏭️ Law already processed: {}", law.registro);
            report.already_present += 1;
            continue;
        }

        let vector = match embedder.embed(&embedding_text(law.rubro, law.texto)).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!("⚠️ Could not embed {}: {}", law.registro, e);
                report.failed += 1;
                continue;
            }
        };

        archive
            .upsert(&ThesisDocument {
                registro: law.registro.to_string(),
                rubro: law.rubro.to_string(),
                texto: law.texto.to_string(),
                epoca: law.epoca.to_string(),
                materia: law.materia.to_string(),
                vector_busqueda: vector,
                fuente: None,
                procesado: true,
                actualizado_en: Some(Utc::now()),
            })
            .await?;
        tracing::info!("✅ Law loaded: {}", law.rubro);
        report.loaded += 1;
    }

    Ok(report)
}
