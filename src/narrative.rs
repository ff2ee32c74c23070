//! Narrative synthesis
//!
//! Turns persisted transactions or query aggregates into the short
//! confirmations the user hears back. Pure string building, no I/O.

use crate::models::{LedgerSummary, QueryFilters, Transaction, TransactionType};

/// Confirmation for one or more freshly recorded transactions
pub fn confirmation(transactions: &[Transaction]) -> String {
    match transactions {
        [] => "No se registró ningún movimiento.".to_string(),
        [tx] => single_confirmation(tx),
        many => grouped_confirmation(many),
    }
}

fn single_confirmation(tx: &Transaction) -> String {
    let concept = if tx.concept.trim().is_empty() {
        "el movimiento"
    } else {
        tx.concept.trim()
    };

    match tx.kind {
        TransactionType::Income => {
            format!("¡Súper! Registré el ingreso de {} por ${:.2}.", concept, tx.amount)
        }
        TransactionType::Debt => {
            format!("Entendido. Registré la deuda de {} por ${:.2}.", concept, tx.amount)
        }
        TransactionType::Expense => {
            let mut base = format!("Listo. Anoté {} por ${:.2}", concept, tx.amount);
            match &tx.merchant {
                Some(merchant) => base.push_str(&format!(" en {}.", merchant)),
                None => base.push('.'),
            }
            base
        }
    }
}

fn grouped_confirmation(transactions: &[Transaction]) -> String {
    let mut parts = Vec::new();

    for (kind, singular, plural) in [
        (TransactionType::Expense, "gasto", "gastos"),
        (TransactionType::Income, "ingreso", "ingresos"),
        (TransactionType::Debt, "deuda", "deudas"),
    ] {
        let of_kind: Vec<&Transaction> =
            transactions.iter().filter(|tx| tx.kind == kind).collect();
        if of_kind.is_empty() {
            continue;
        }

        let total: f64 = of_kind.iter().map(|tx| tx.amount).sum();
        let noun = if of_kind.len() == 1 { singular } else { plural };
        parts.push(format!("{} {} (${:.2})", of_kind.len(), noun, total));
    }

    if parts.is_empty() {
        return "Procesé tus movimientos.".to_string();
    }

    format!("Procesado: {}.", parts.join(", "))
}

/// Natural-language answer for the read path: verified totals plus the
/// pending (provisional) side figure
pub fn query_summary(
    summary: &LedgerSummary,
    pending: &LedgerSummary,
    filters: &QueryFilters,
) -> String {
    let detail = filter_detail(filters);

    if summary.count == 0 && pending.count == 0 {
        return "Según mis registros, no encontré transacciones que coincidan con tu consulta."
            .to_string();
    }

    if summary.count == 0 {
        return format!(
            "No tienes transacciones validadas{}, pero tienes ${:.2} en {} transacciones pendientes de revisión.",
            detail, pending.total, pending.count
        );
    }

    if pending.count > 0 {
        return format!(
            "Tus movimientos validados suman ${:.2}{}, en {} transacciones. Además, tienes ${:.2} en {} transacciones pendientes de revisión.",
            summary.total, detail, summary.count, pending.total, pending.count
        );
    }

    format!(
        "Tus movimientos validados suman ${:.2}{}, en {} transacciones.",
        summary.total, detail, summary.count
    )
}

fn filter_detail(filters: &QueryFilters) -> String {
    let mut parts = Vec::new();

    if let Some(category) = &filters.category {
        parts.push(format!("en la categoría {}", category));
    }

    if let Some(kind) = filters.kind {
        let label = match kind {
            TransactionType::Expense => "de tipo gasto",
            TransactionType::Income => "de tipo ingreso",
            TransactionType::Debt => "de tipo deuda",
        };
        parts.push(label.to_string());
    }

    match (filters.start_date, filters.end_date) {
        (Some(start), Some(end)) if start == end => {
            parts.push(format!("el día {}", start));
        }
        (Some(start), Some(end)) => {
            parts.push(format!("entre {} y {}", start, end));
        }
        _ => {}
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!(" {}", parts.join(", "))
    }
}
