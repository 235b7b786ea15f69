pub fn user_chunk_analysis(chunk: &str) -> String {
    format!(r#"Analise o seguinte conjunto de posts de forma concisa, identificando apenas os principais pontos.
Extraia as informações mais relevantes sobre contexto, menções a marcas e produtos,
e o sentimento geral, preferencialmente em frases curtas e objetivas.
```
{chunk}
```"#, chunk = chunk)
}

pub fn user_merge_analyses(chunk_analyses: &str) -> String {
    format!(r#"Combine as análises individuais dos chunks em um resumo único e conciso.
Foque em destacar os insights mais evidentes e os padrões recorrentes.

Aqui estão as análises individuais:
```
{analyses}
```

Resumo conciso dos principais insights:"#, analyses = chunk_analyses)
}

pub fn user_style_report(report: &str) -> String {
    format!(r#"Formate o seguinte relatório em HTML estilizado. Use uma estrutura limpa com cabeçalhos, parágrafos e linhas de separação.
Adicione CSS básico para melhorar a legibilidade, como margens, fontes, e cores suaves. Sua resposta deve ser APENAS o HTML,
sem nenhum texto adicional, e nenhum caractér especial. Seu retorno será renderizado diretamente em uma página HTML.
Destaque pontos importantes em bullet points, e também use negrito em palavras-chave.

Relatório:
{report}

HTML:"#, report = report)
}
