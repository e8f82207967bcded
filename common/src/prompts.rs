//! プロンプト生成モジュール
//!
//! - SYSTEM_INSTRUCTIONS: 判定基準（モデルへのシステム指示）
//! - build_item_prompt: 1品目ぶんのユーザー入力

use crate::error::Result;
use crate::types::FoodItem;
use serde::Serialize;

/// 項目が空のときにモデルへ渡す値
pub const UNSPECIFIED: &str = "Não especificado";

/// ハーフポーション判定のシステム指示
///
/// 判定ロジックはすべてこの文面に委ねる。曖昧な単位に対する `false` も
/// ここでの指示であり、コード側では上書きしない。
pub const SYSTEM_INSTRUCTIONS: &str = r#"## INSTRUÇÃO DE SISTEMA - AVALIADOR DE PORÇÕES CULINÁRIAS (v2.0)

### 1. IDENTIDADE E OBJETIVO
Você é um **Avaliador de Porções Culinárias**, especialista em lógica de cardápios e práticas de consumo no contexto brasileiro. Analise cada alimento e determine se a oferta de "meia porção" para aquele item faz sentido. Sua decisão (`true` ou `false`) habilita ou não a divisão dos valores nutricionais. A análise se baseia na **combinação entre o alimento e sua unidade de medida**.

### 2. CONTEXTO DA TAREFA
Você receberá um único documento JSON com os campos `nome_cardapio` e `unidade_caseira`. Sua única saída deve ser um objeto JSON válido contendo exclusivamente a chave `aceita_meia_porcao` com um valor booleano.
Exemplo de saída válida:
{"aceita_meia_porcao": true}

### 3. LÓGICA DE DECISÃO
A divisão da `unidade_caseira` por dois resulta em uma quantidade que uma pessoa comum no Brasil consideraria prática, reconhecível e aceitável para consumir?

1. **Princípio da Divisibilidade (geralmente `true`):** itens grandes, fracionáveis ou servidos a partir de uma fonte maior.
2. **Princípio da Unidade Mínima (geralmente `false`):** itens pequenos, consumidos como unidade única ou embalados individualmente.
3. **Princípio da Praticidade (fator decisivo):** a meia porção resultante é fácil de medir e servir?

| nome_cardapio | unidade_caseira | Decisão |
| :--- | :--- | :--- |
| Pão francês | Unidade | true |
| Ovo cozido | Unidade | false |
| Mamão Formosa | Fatia | true |
| Mamão picado | Colher de sopa | false |
| Iogurte | Pote 1L | true |
| Iogurte | Pote 170g | false |
| Pizza | Fatia | true |
| Biscoito recheado | Unidade | false |

### 4. REGRAS E RESTRIÇÕES
- NÃO retorne texto, explicações ou qualquer outra coisa além do objeto JSON especificado.
- NÃO baseie sua decisão apenas no `nome_cardapio`. A `unidade_caseira` é o fator decisivo.
- Se a `unidade_caseira` for ambígua, ausente ou não fizer sentido (ex: "gramas"), retorne `false` como medida de segurança.
- O mesmo input deve sempre gerar o mesmo output.
"#;

#[derive(Serialize)]
struct ItemPrompt<'a> {
    nome_cardapio: &'a str,
    unidade_caseira: &'a str,
}

/// 1品目ぶんのユーザー入力（整形済みJSON）を生成
///
/// モデルに渡すのは名称と単位のみ。空欄は [`UNSPECIFIED`] に置き換える。
pub fn build_item_prompt(item: &FoodItem) -> Result<String> {
    let prompt = ItemPrompt {
        nome_cardapio: or_unspecified(&item.nome_cardapio),
        unidade_caseira: or_unspecified(&item.unidade_caseira),
    };
    Ok(serde_json::to_string_pretty(&prompt)?)
}

fn or_unspecified(value: &str) -> &str {
    if value.trim().is_empty() {
        UNSPECIFIED
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_prompt_contains_only_name_and_unit() {
        let mut item = FoodItem::new(1, "Iogurte", "Pote 170g");
        item.extra.insert("kcal".into(), serde_json::json!(120));

        let prompt = build_item_prompt(&item).unwrap();
        let value: serde_json::Value = serde_json::from_str(&prompt).unwrap();

        assert_eq!(value["nome_cardapio"], "Iogurte");
        assert_eq!(value["unidade_caseira"], "Pote 170g");
        assert_eq!(value.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_item_prompt_blank_unit_is_unspecified() {
        let item = FoodItem::new(2, "Sopa", "  ");
        let prompt = build_item_prompt(&item).unwrap();
        assert!(prompt.contains(UNSPECIFIED));
    }

    #[test]
    fn test_system_instructions_name_the_result_field() {
        assert!(SYSTEM_INSTRUCTIONS.contains(crate::types::RESULT_FIELD));
        assert!(SYSTEM_INSTRUCTIONS.contains("medida de segurança"));
    }
}
